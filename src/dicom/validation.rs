use anyhow::{bail, Result};
use crate::dicom::PhotometricInterpretation;
use crate::types::BitDepth;

/// Only single-sample monochrome images carry the values the display pipeline maps.
#[inline]
pub fn validate_grayscale(
    photometric_interpretation: &PhotometricInterpretation,
    samples_per_pixel: u16,
) -> Result<()> {
    if samples_per_pixel != 1 || !photometric_interpretation.is_grayscale() {
        bail!(
            "Unsupported image type {photometric_interpretation} with {samples_per_pixel} samples per pixel (only MONOCHROME1/MONOCHROME2 are supported)"
        );
    }

    Ok(())
}

#[inline]
pub fn validate_planar_configuration(
    planar_configuration: Option<u16>,
    samples_per_pixel: u16,
) -> Result<()> {
    if planar_configuration.is_some_and(|p| p != 0) && samples_per_pixel == 1 {
        bail!("Planar configuration should only be present for multi-sample images");
    }

    Ok(())
}

#[inline]
pub fn validate_bit_depth(bit_depth: BitDepth) -> Result<()> {
    if !matches!(bit_depth.allocated, 8 | 16 | 32) {
        bail!(
            "Unsupported bits allocated: {} (expected 8, 16, or 32)",
            bit_depth.allocated
        );
    }
    if !bit_depth.is_valid() {
        bail!("Bits stored {} exceeds bits allocated {}", bit_depth.stored, bit_depth.allocated);
    }

    Ok(())
}

#[inline]
pub fn validate_frame(frame: u32, number_of_frames: u32) -> Result<()> {
    if frame >= number_of_frames {
        bail!("Frame {frame} out of range (image has {number_of_frames} frames)");
    }

    Ok(())
}

pub fn validate_metadata(
    photometric_interpretation: &PhotometricInterpretation,
    samples_per_pixel: u16,
    planar_configuration: Option<u16>,
    bit_depth: BitDepth,
) -> Result<()> {
    validate_grayscale(photometric_interpretation, samples_per_pixel)?;
    validate_planar_configuration(planar_configuration, samples_per_pixel)?;
    validate_bit_depth(bit_depth)?;
    Ok(())
}
