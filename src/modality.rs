//! Modality transform: stored sample values to real values
//!
//! Covers the slope/intercept rescale, explicit modality lookup tables, pixel padding and
//! the lazily computed value range of a frame.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{RenderError, Result};
use crate::types::{BitDepth, Dimensions, RescaleParams};
use crate::window::SequenceLut;

/// Stored to real value function of one image.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalityLut {
    Rescale(RescaleParams),
    /// Modality LUT Sequence: stored value indexes the table directly
    Table(Arc<SequenceLut>),
}

impl Default for ModalityLut {
    fn default() -> Self {
        Self::Rescale(RescaleParams::identity())
    }
}

impl ModalityLut {
    #[inline]
    #[must_use]
    pub fn apply(&self, stored: i32) -> f64 {
        match self {
            Self::Rescale(rescale) => rescale.apply(stored),
            Self::Table(lut) => f64::from(lut.entry(f64::from(stored))),
        }
    }

    /// Real value range covered by stored values in `[lo, hi]`.
    #[must_use]
    pub fn real_range(&self, lo: i64, hi: i64) -> (f64, f64) {
        match self {
            Self::Rescale(rescale) => {
                let a = (lo as f64).mul_add(rescale.slope, rescale.intercept);
                let b = (hi as f64).mul_add(rescale.slope, rescale.intercept);
                (a.min(b), a.max(b))
            }
            Self::Table(lut) => {
                let last = lut.entries.len() as i64 - 1;
                let start = (lo - lut.first_mapped).clamp(0, last) as usize;
                let end = (hi - lut.first_mapped).clamp(0, last) as usize;
                lut.entries[start..=end]
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &e| {
                        (min.min(f64::from(e)), max.max(f64::from(e)))
                    })
            }
        }
    }
}

/// Pixel Padding Value (0028,0120) with the optional Pixel Padding Range Limit (0028,0121).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingRange {
    lo: i32,
    hi: i32,
}

impl PaddingRange {
    /// The limit may be given above or below the padding value.
    #[must_use]
    pub fn new(value: i32, limit: Option<i32>) -> Self {
        let limit = limit.unwrap_or(value);
        Self {
            lo: value.min(limit),
            hi: value.max(limit),
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, stored: i32) -> bool {
        (self.lo..=self.hi).contains(&stored)
    }
}

/// Stored extremes of a frame: over every pixel and over non-padding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Extrema {
    all: Option<(i32, i32)>,
    unpadded: Option<(i32, i32)>,
}

fn widen(range: Option<(i32, i32)>, v: i32) -> Option<(i32, i32)> {
    Some(match range {
        Some((min, max)) => (min.min(v), max.max(v)),
        None => (v, v),
    })
}

/// Stored samples of one frame. The extremes are scanned once on first use; a new frame
/// means a new buffer and a new scan.
#[derive(Debug)]
pub struct FrameBuffer {
    index: u32,
    dimensions: Dimensions,
    values: Arc<[i32]>,
    padding: Option<PaddingRange>,
    extrema: OnceLock<Extrema>,
}

impl FrameBuffer {
    /// Fails when the sample count does not match the dimensions.
    pub fn new(
        index: u32,
        dimensions: Dimensions,
        values: impl Into<Arc<[i32]>>,
        padding: Option<PaddingRange>,
    ) -> Result<Self> {
        let values = values.into();
        if values.len() != dimensions.pixel_count() {
            return Err(RenderError::invalid(format!(
                "frame has {} samples, expected {}",
                values.len(),
                dimensions.pixel_count()
            )));
        }
        Ok(Self {
            index,
            dimensions,
            values,
            padding,
            extrema: OnceLock::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Whether the extremes have already been computed.
    #[must_use]
    pub fn is_scanned(&self) -> bool {
        self.extrema.get().is_some()
    }

    /// Stored min/max, skipping padding pixels when `exclude_padding` is set.
    #[must_use]
    pub fn stored_min_max(&self, exclude_padding: bool) -> Option<(i32, i32)> {
        let extrema = self.extrema.get_or_init(|| {
            debug!(frame = self.index, samples = self.values.len(), "scanning frame extremes");
            self.values.iter().fold(Extrema::default(), |acc, &v| Extrema {
                all: widen(acc.all, v),
                unpadded: if self.padding.is_some_and(|p| p.contains(v)) {
                    acc.unpadded
                } else {
                    widen(acc.unpadded, v)
                },
            })
        });
        if exclude_padding {
            extrema.unpadded
        } else {
            extrema.all
        }
    }
}

/// Applies the modality transform of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelValueMapper {
    lut: ModalityLut,
    bit_depth: BitDepth,
    padding: Option<PaddingRange>,
    inverted: bool,
}

impl PixelValueMapper {
    #[must_use]
    pub fn new(lut: ModalityLut, bit_depth: BitDepth) -> Self {
        Self {
            lut,
            bit_depth,
            padding: None,
            inverted: false,
        }
    }

    #[must_use]
    pub fn with_padding(mut self, padding: Option<PaddingRange>) -> Self {
        self.padding = padding;
        self
    }

    /// Inverted mappers (MONOCHROME1) send padding to the top of the range.
    #[must_use]
    pub fn with_inversion(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    #[inline]
    #[must_use]
    pub fn lut(&self) -> &ModalityLut {
        &self.lut
    }

    #[inline]
    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    #[inline]
    #[must_use]
    pub fn padding(&self) -> Option<PaddingRange> {
        self.padding
    }

    #[inline]
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    #[inline]
    #[must_use]
    pub fn is_padding(&self, stored: i32) -> bool {
        self.padding.is_some_and(|p| p.contains(stored))
    }

    /// Real values reachable from the stored bit depth.
    #[must_use]
    pub fn nominal_range(&self) -> (f64, f64) {
        let (lo, hi) = self.bit_depth.stored_range();
        self.lut.real_range(lo, hi)
    }

    /// Value padding pixels map to when padding is active.
    #[must_use]
    pub fn padding_sentinel(&self) -> f64 {
        let (min, max) = self.nominal_range();
        if self.inverted { max } else { min }
    }

    /// Real value of a stored sample. With `padding`, padding samples map to the sentinel.
    #[inline]
    #[must_use]
    pub fn to_real_value(&self, stored: i32, padding: bool) -> f64 {
        if padding && self.is_padding(stored) {
            self.padding_sentinel()
        } else {
            self.lut.apply(stored)
        }
    }

    /// Real min/max of a frame, or `MissingImageData` when the frame has no usable sample.
    ///
    /// With `exclude_low_bit_depth`, images of 8 stored bits or fewer report their nominal range
    /// without scanning.
    pub fn try_min_max(
        &self,
        frame: &FrameBuffer,
        padding: bool,
        exclude_low_bit_depth: bool,
    ) -> Result<(f64, f64)> {
        if exclude_low_bit_depth && self.bit_depth.stored <= 8 {
            return Ok(self.nominal_range());
        }
        let (lo, hi) = frame
            .stored_min_max(padding && self.padding.is_some())
            .ok_or(RenderError::MissingImageData)?;
        Ok(self.lut.real_range(i64::from(lo), i64::from(hi)))
    }

    /// Like [`Self::try_min_max`], degrading to `(0.0, 0.0)` when data is missing.
    #[must_use]
    pub fn min_max(&self, frame: &FrameBuffer, padding: bool, exclude_low_bit_depth: bool) -> (f64, f64) {
        self.try_min_max(frame, padding, exclude_low_bit_depth)
            .unwrap_or_else(|err| {
                debug!(frame = frame.index(), %err, "no value range");
                (0.0, 0.0)
            })
    }
}

/// Decodes little-endian samples into stored values, masked to the stored bits and sign
/// extended for signed data.
pub fn decode_samples(bytes: &[u8], bit_depth: BitDepth) -> Result<Vec<i32>> {
    if !bit_depth.is_valid() {
        return Err(RenderError::invalid(format!("bit depth {bit_depth}")));
    }
    let width = bit_depth.bytes_per_sample();
    if !bytes.len().is_multiple_of(width) {
        return Err(RenderError::invalid(format!(
            "{} bytes is not a whole number of {width}-byte samples",
            bytes.len()
        )));
    }

    let stored = u32::from(bit_depth.stored);
    let mask: u32 = if stored >= 32 { u32::MAX } else { (1 << stored) - 1 };
    let sign_bit: u32 = 1 << (stored - 1);

    Ok(bytes
        .chunks_exact(width)
        .map(|chunk| {
            let raw = match *chunk {
                [a] => u32::from(a),
                [a, b] => u32::from(u16::from_le_bytes([a, b])),
                [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
                _ => 0,
            } & mask;
            if bit_depth.signed && raw & sign_bit != 0 {
                (raw | !mask) as i32
            } else {
                i32::try_from(raw).unwrap_or(i32::MAX)
            }
        })
        .collect())
}
