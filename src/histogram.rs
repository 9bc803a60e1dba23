//! Histogram of real pixel values
//!
//! Raw counts are kept as binned. Logarithmic compression and accumulation are display
//! transforms computed on demand, so toggling them never alters the counts.

use std::io::{self, Write};

use tracing::debug;

use crate::error::{RenderError, Result};
use crate::lut::ByteLut;
use crate::modality::{FrameBuffer, PixelValueMapper};
use crate::window::WindowLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<f32>,
    min: f64,
    max: f64,
}

impl Histogram {
    /// Bins `values` into `bin_count` equal-width bins over `[min, max)`. Values outside the
    /// domain land in the first or last bin; non-finite values are skipped.
    pub fn bin(
        values: impl IntoIterator<Item = f64>,
        bin_count: usize,
        min: f64,
        max: f64,
    ) -> Result<Self> {
        if bin_count == 0 {
            return Err(RenderError::invalid("histogram needs at least one bin"));
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(RenderError::invalid(format!("empty histogram domain [{min}, {max})")));
        }

        let mut histogram = Self {
            counts: vec![0.0; bin_count],
            min,
            max,
        };
        for value in values.into_iter().filter(|v| v.is_finite()) {
            let i = histogram.bin_index(value);
            histogram.counts[i] += 1.0;
        }
        Ok(histogram)
    }

    /// Bins the real values of a frame over the window domain `[level_min, level_max]`.
    /// With `padding`, padding pixels are left out.
    pub fn from_frame(
        frame: &FrameBuffer,
        mapper: &PixelValueMapper,
        window: &WindowLevel,
        bin_count: usize,
        padding: bool,
    ) -> Result<Self> {
        let values = frame
            .values()
            .iter()
            .filter(|&&v| !(padding && mapper.is_padding(v)))
            .map(|&v| mapper.to_real_value(v, false));
        let histogram = Self::bin(values, bin_count, window.level_min(), window.level_max())?;
        debug!(
            frame = frame.index(),
            bins = bin_count,
            total = histogram.total(),
            "histogram computed"
        );
        Ok(histogram)
    }

    #[inline]
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Bin of a real value, clamped to the first and last bins.
    #[must_use]
    pub fn bin_index(&self, value: f64) -> usize {
        let last = self.counts.len() - 1;
        let position = ((value - self.min) / self.bin_width()).floor();
        if position <= 0.0 {
            0
        } else {
            (position as usize).min(last)
        }
    }

    /// Real value range `[lo, hi)` of bin `i`.
    #[must_use]
    pub fn bin_to_range(&self, i: usize) -> (f64, f64) {
        let w = self.bin_width();
        (
            (i as f64).mul_add(w, self.min),
            ((i + 1) as f64).mul_add(w, self.min),
        )
    }

    #[inline]
    #[must_use]
    pub fn counts(&self) -> &[f32] {
        &self.counts
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.counts.iter().map(|&c| f64::from(c)).sum()
    }

    /// Displayed value of every bin.
    #[must_use]
    pub fn display_values(&self, logarithmic: bool, accumulate: bool) -> Vec<f64> {
        let mut sum = 0.0;
        self.counts
            .iter()
            .map(|&count| {
                let value = if logarithmic {
                    f64::from(count).ln_1p()
                } else {
                    f64::from(count)
                };
                if accumulate {
                    sum += value;
                    sum
                } else {
                    value
                }
            })
            .collect()
    }

    /// Displayed value of bin `i`, 0 past the last bin.
    #[must_use]
    pub fn display_value(&self, i: usize, logarithmic: bool, accumulate: bool) -> f64 {
        if i >= self.counts.len() {
            return 0.0;
        }
        let value = |count: f32| {
            if logarithmic {
                f64::from(count).ln_1p()
            } else {
                f64::from(count)
            }
        };
        if accumulate {
            self.counts.iter().take(i + 1).map(|&c| value(c)).sum()
        } else {
            value(self.counts[i])
        }
    }

    /// Scale of the display: the largest bin (at least 1), or the total when accumulating.
    #[must_use]
    pub fn max_display_value(&self, logarithmic: bool, accumulate: bool) -> f64 {
        let values = self.display_values(logarithmic, accumulate);
        if accumulate {
            values.last().copied().unwrap_or(0.0)
        } else {
            values.into_iter().fold(1.0, f64::max)
        }
    }

    /// Integer class label of a bin: `lo` or `lo...hi`.
    #[must_use]
    pub fn bin_label(&self, i: usize) -> String {
        let (lo, hi) = self.bin_to_range(i);
        let first = lo.ceil() as i64;
        let last = hi.floor() as i64;
        if last != first && (last as f64) < self.max {
            format!("{first}...{last}")
        } else {
            first.to_string()
        }
    }

    /// Display colour of a bin: its center value through the window and lookup table.
    #[must_use]
    pub fn bin_color(&self, i: usize, window: &WindowLevel, lut: &ByteLut) -> [u8; 3] {
        let (lo, hi) = self.bin_to_range(i);
        lut.color(lut.index_of(window.normalize((lo + hi) / 2.0)))
    }

    /// Writes `Class,Occurrences` rows, one per bin.
    pub fn write_csv(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, "Class,Occurrences")?;
        for (i, count) in self.counts.iter().enumerate() {
            writeln!(writer, "{},{count}", self.bin_label(i))?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::ColorRamp;
    use crate::modality::{ModalityLut, PaddingRange};
    use crate::types::{BitDepth, Dimensions, RescaleParams};
    use crate::window::TransferShape;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use std::fs;

    fn sample() -> Histogram {
        Histogram::bin([5.0, 5.0, 55.0, 95.0], 4, 0.0, 100.0).unwrap()
    }

    #[test]
    fn test_bins_and_accumulation() {
        let h = sample();
        assert_eq!(h.counts(), [2.0_f32, 0.0, 1.0, 1.0]);
        assert_eq!(h.display_values(false, true), [2.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.display_value(1, false, true), 2.0);
        assert_eq!(h.display_value(3, false, false), 1.0);
        assert_eq!(h.display_value(4, false, true), 0.0);
        assert_eq!(h.display_value(4, false, false), 0.0);
        assert_eq!(h.display_value(usize::MAX, true, true), 0.0);
        // toggling back shows the raw counts again
        assert_eq!(h.display_values(false, false), [2.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_logarithmic_round_trip() {
        let h = sample();
        let log = h.display_values(true, false);
        assert_eq!(log[1], 0.0);
        for (value, &count) in log.iter().zip(h.counts()) {
            assert_relative_eq!(value.exp_m1(), f64::from(count), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_out_of_domain_values_clamped() {
        let h = Histogram::bin([-10.0, 100.0, 1e9, f64::NAN], 4, 0.0, 100.0).unwrap();
        assert_eq!(h.counts(), [1.0_f32, 0.0, 0.0, 2.0]);
        assert_eq!(h.total(), 3.0);
    }

    #[test]
    fn test_bin_ranges() {
        let h = sample();
        assert_eq!(h.bin_to_range(0), (0.0, 25.0));
        assert_eq!(h.bin_to_range(3), (75.0, 100.0));
        assert_eq!(h.bin_index(25.0), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_matches!(
            Histogram::bin([1.0], 0, 0.0, 1.0),
            Err(RenderError::InvalidParameter(_))
        );
        assert_matches!(
            Histogram::bin([1.0], 4, 1.0, 1.0),
            Err(RenderError::InvalidParameter(_))
        );
    }

    #[test]
    fn test_max_display_value() {
        let h = sample();
        assert_eq!(h.max_display_value(false, false), 2.0);
        assert_eq!(h.max_display_value(false, true), 4.0);
        let empty = Histogram::bin([], 2, 0.0, 1.0).unwrap();
        assert_eq!(empty.max_display_value(false, false), 1.0);
    }

    #[test]
    fn test_labels() {
        let h = sample();
        assert_eq!(h.bin_label(0), "0...25");
        assert_eq!(h.bin_label(3), "75");
        let fine = Histogram::bin([], 10, 0.0, 5.0).unwrap();
        assert_eq!(fine.bin_label(1), "1");
    }

    #[test]
    fn test_bin_color_follows_window() {
        let h = sample();
        let wl = WindowLevel::new(50.0, 100.0, TransferShape::Linear, 0.0, 100.0).unwrap();
        let lut = ByteLut::build(&TransferShape::Linear, &ColorRamp::Gray.lut(), false).unwrap();
        assert_eq!(h.bin_color(0, &wl, &lut), [32, 32, 32]);
        let inverted = ByteLut::build(&TransferShape::Linear, &ColorRamp::Gray.lut(), true).unwrap();
        assert_eq!(h.bin_color(0, &wl, &inverted), [223, 223, 223]);
    }

    #[test]
    fn test_from_frame_skips_padding() {
        let padding = Some(PaddingRange::new(0, None));
        let mapper = PixelValueMapper::new(
            ModalityLut::Rescale(RescaleParams::new(1.0, -10.0)),
            BitDepth::new(16, 12, false),
        )
        .with_padding(padding);
        let frame = FrameBuffer::new(0, Dimensions::new(2, 2), vec![0, 15, 65, 105], padding).unwrap();
        let wl = WindowLevel::new(50.0, 100.0, TransferShape::Linear, 0.0, 100.0).unwrap();

        let h = Histogram::from_frame(&frame, &mapper, &wl, 4, true).unwrap();
        assert_eq!(h.counts(), [1.0_f32, 0.0, 1.0, 1.0]);
        let all = Histogram::from_frame(&frame, &mapper, &wl, 4, false).unwrap();
        assert_eq!(all.counts(), [2.0_f32, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histogram.csv");
        sample().write_csv(fs::File::create(&path).unwrap()).unwrap();
        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv, "Class,Occurrences\n0...25,2\n25...50,0\n50...75,1\n75,1\n");
    }
}
