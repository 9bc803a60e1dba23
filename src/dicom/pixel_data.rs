//! DICOM pixel data extraction
//!
//! Produces the little-endian sample bytes of one frame, decoding compressed transfer
//! syntaxes and swapping big-endian words.

use anyhow::{bail, Context, Result};
use dicom::dictionary_std::tags;
use dicom::object::{FileDicomObject, InMemDicomObject, StandardDataDictionary};
use dicom::pixeldata::PixelDecoder;
use tracing::debug;

use crate::types::{BitDepth, Dimensions, TransferSyntax};

type FileObject = FileDicomObject<InMemDicomObject<StandardDataDictionary>>;

/// Little-endian bytes of `frame` (zero-based).
pub fn extract_frame_bytes(
    obj: &FileObject,
    dimensions: Dimensions,
    bit_depth: BitDepth,
    transfer_syntax: &TransferSyntax,
    frame: u32,
) -> Result<Vec<u8>> {
    let all_frames = if bit_depth.allocated == 16 && transfer_syntax.is_big_endian() {
        extract_big_endian_16bit(obj)?
    } else if bit_depth.allocated == 32 && !detect_compression(&transfer_syntax.uid) {
        extract_raw_pixel_data(obj)?
    } else {
        extract_decoded_pixel_data(obj)?
    };

    let frame_len = dimensions.pixel_count() * bit_depth.bytes_per_sample();
    let start = frame as usize * frame_len;
    debug!(frame, frame_len, total = all_frames.len(), "slicing pixel data");

    match all_frames.get(start..start + frame_len) {
        Some(bytes) => Ok(bytes.to_vec()),
        None => bail!(
            "Pixel data too short for frame {frame}: {} bytes, expected at least {}",
            all_frames.len(),
            start + frame_len
        ),
    }
}

/// Detect if transfer syntax uses compression
#[inline]
#[must_use]
fn detect_compression(uid: &str) -> bool {
    uid.starts_with("1.2.840.10008.1.2.4")   // JPEG family, JPEG-LS, JPEG 2000
        || uid == "1.2.840.10008.1.2.5"      // RLE lossless
}

/// Extract big-endian 16-bit pixel data and convert to little-endian
fn extract_big_endian_16bit(obj: &FileObject) -> Result<Vec<u8>> {
    let raw_bytes = obj
        .get(tags::PIXEL_DATA)
        .context("Missing pixel data")?
        .to_bytes()
        .context("Failed to get raw pixel data bytes")?;

    if !raw_bytes.len().is_multiple_of(2) {
        bail!("Invalid 16-bit pixel data length");
    }

    Ok(raw_bytes
        .chunks_exact(2)
        .flat_map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]).to_le_bytes())
        .collect())
}

/// Extract raw native pixel data (32-bit samples)
fn extract_raw_pixel_data(obj: &FileObject) -> Result<Vec<u8>> {
    Ok(obj
        .get(tags::PIXEL_DATA)
        .context("Missing pixel data")?
        .to_bytes()
        .context("Failed to get raw pixel data bytes")?
        .to_vec())
}

/// Decoded samples without any value transform applied
fn extract_decoded_pixel_data(obj: &FileObject) -> Result<Vec<u8>> {
    let decoded = obj
        .decode_pixel_data()
        .context("Failed to decode pixel data")?;
    Ok(decoded.data().to_vec())
}
