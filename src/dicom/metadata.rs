//! DICOM metadata structure

use std::sync::Arc;

use super::photometric::PhotometricInterpretation;
use crate::element::{ImageAttributes, ImageElement};
use crate::modality::FrameBuffer;
use crate::types::*;

/// Patient, study and series tags. Also available when image extraction fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptiveTags {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_birth_date: Option<String>,
    pub accession_number: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub modality: Option<String>,
    pub series_description: Option<String>,
}

/// DICOM image metadata extracted from the file, with the stored values of one frame
#[derive(Debug, Clone)]
pub struct DicomMetadata {
    pub dimensions: Dimensions,
    pub number_of_frames: u32,
    /// Zero-based frame the stored values belong to
    pub frame: u32,

    pub photometric_interpretation: PhotometricInterpretation,
    pub samples_per_pixel: u16, // always 1, color images are rejected
    pub bit_depth: BitDepth,
    pub planar_configuration: Option<u16>,

    pub descriptive: DescriptiveTags,

    // Display pipeline inputs
    pub attributes: ImageAttributes,
    pub stored_values: Arc<[i32]>,

    // Technical metadata
    pub sop_class: Option<SOPClass>,
    pub transfer_syntax: TransferSyntax,
}

impl DicomMetadata {
    #[inline(always)]
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.dimensions.rows
    }

    #[inline(always)]
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.dimensions.cols
    }

    #[inline]
    #[must_use]
    pub fn pixel_aspect_ratio(&self) -> Option<PixelAspectRatio> {
        self.attributes.calibration.pixel_aspect_ratio
    }

    #[inline]
    #[must_use]
    pub fn slice_thickness(&self) -> Option<f64> {
        self.attributes.slice_thickness
    }

    /// Returns true if this DICOM file uses big-endian byte order
    #[inline(always)]
    #[must_use]
    pub fn is_big_endian(&self) -> bool {
        self.transfer_syntax.is_big_endian()
    }

    /// Displayable element for the extracted frame.
    pub fn to_element(&self) -> crate::error::Result<ImageElement> {
        let frame = FrameBuffer::new(
            self.frame,
            self.dimensions,
            Arc::clone(&self.stored_values),
            self.attributes.mapper.padding(),
        )?;
        Ok(ImageElement::new(self.attributes.clone(), frame))
    }
}
