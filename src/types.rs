//! Domain-specific types for DICOM metadata

use dicom::transfer_syntax::entries;
use std::fmt;

/// DICOM transfer syntax (UID, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: String,
    pub name: String,
}

impl TransferSyntax {
    #[must_use]
    pub fn new(uid: String, name: String) -> Self {
        Self { uid, name }
    }

    #[inline]
    #[must_use]
    pub fn is_big_endian(&self) -> bool {
        self.uid == entries::EXPLICIT_VR_BIG_ENDIAN.uid()
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name} ({uid})", name = self.name, uid = self.uid)
    }
}

/// SOP Class (UID, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SOPClass {
    pub uid: String,
    pub name: String,
}

impl SOPClass {
    #[must_use]
    pub fn new(uid: String, name: String) -> Self {
        Self { uid, name }
    }
}

impl fmt::Display for SOPClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name} ({uid})", name = self.name, uid = self.uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub rows: u16,
    pub cols: u16,
}

impl Dimensions {
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{cols}x{rows}", cols = self.cols, rows = self.rows)
    }
}

/// Rescale parameters for converting stored pixel values to real units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleParams {
    pub slope: f64,
    pub intercept: f64,
}

impl RescaleParams {
    #[must_use]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }

    #[inline(always)]
    #[must_use]
    // Hot path: called for every pixel during windowing
    pub fn apply(&self, stored: i32) -> f64 {
        f64::from(stored).mul_add(self.slope, self.intercept)
    }
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for RescaleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope={slope}, intercept={intercept}",
            slope = self.slope,
            intercept = self.intercept
        )
    }
}

/// Pixel Aspect Ratio (0028,0034): vertical size over horizontal size of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAspectRatio {
    pub vertical: u32,
    pub horizontal: u32,
}

impl PixelAspectRatio {
    #[must_use]
    pub fn new(vertical: u32, horizontal: u32) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_square(&self) -> bool {
        self.vertical == self.horizontal
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.vertical > 0 && self.horizontal > 0
    }

    /// Pixel size `(x, y)` that stretches the image so that displayed pixels are square.
    #[must_use]
    pub fn stretch(&self) -> (f64, f64) {
        if self.horizontal < self.vertical {
            (1.0, f64::from(self.vertical) / f64::from(self.horizontal))
        } else {
            (f64::from(self.horizontal) / f64::from(self.vertical), 1.0)
        }
    }
}

impl fmt::Display for PixelAspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{vertical}:{horizontal}",
            vertical = self.vertical,
            horizontal = self.horizontal
        )
    }
}

/// Bit depth and sample representation of stored pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepth {
    pub allocated: u16,
    pub stored: u16,
    pub signed: bool,
}

impl BitDepth {
    #[must_use]
    pub fn new(allocated: u16, stored: u16, signed: bool) -> Self {
        Self {
            allocated,
            stored,
            signed,
        }
    }

    #[inline]
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.allocated / 8)
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.allocated, 8 | 16 | 32) && self.stored > 0 && self.stored <= self.allocated
    }

    /// Smallest and largest stored value representable with `stored` bits.
    #[must_use]
    pub fn stored_range(&self) -> (i64, i64) {
        let bits = u32::from(self.stored.clamp(1, 32));
        if self.signed {
            (-(1_i64 << (bits - 1)), (1_i64 << (bits - 1)) - 1)
        } else {
            (0, (1_i64 << bits) - 1)
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{stored}/{allocated} bits {sign}",
            stored = self.stored,
            allocated = self.allocated,
            sign = if self.signed { "signed" } else { "unsigned" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_range() {
        assert_eq!(BitDepth::new(16, 12, false).stored_range(), (0, 4095));
        assert_eq!(BitDepth::new(16, 16, true).stored_range(), (-32768, 32767));
        assert_eq!(BitDepth::new(8, 8, false).stored_range(), (0, 255));
        assert_eq!(BitDepth::new(32, 32, false).stored_range(), (0, 4_294_967_295));
    }

    #[test]
    fn test_aspect_ratio_stretch() {
        assert_eq!(PixelAspectRatio::new(2, 1).stretch(), (1.0, 2.0));
        assert_eq!(PixelAspectRatio::new(1, 2).stretch(), (2.0, 1.0));
        assert!(PixelAspectRatio::new(3, 3).is_square());
    }

    #[test]
    fn test_rescale_apply() {
        let rescale = RescaleParams::new(2.0, -1024.0);
        assert_eq!(rescale.apply(512), 0.0);
        assert_eq!(RescaleParams::default(), RescaleParams::identity());
    }
}
