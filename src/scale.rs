//! Ruler scale: round physical lengths that fit a screen extent

use tracing::trace;

use crate::units::{format_length, DisplayLength, Unit};

const MAX_ITERATIONS: u32 = 50;

/// Ratio to divide a candidate length by to reach the next smaller round value.
///
/// Walking down from a power of ten gives 1000, 500, 200, 100, 50, 20, 10, ...
#[must_use]
pub fn leading_divisor(length: f64) -> f64 {
    let shift = (length.log10() + 0.1).floor();
    let first_digit = (length / 10_f64.powf(shift) + 0.5).trunc();
    if first_digit == 5.0 {
        2.5
    } else {
        2.0
    }
}

/// Largest round physical length whose on-screen size fits `max_screen_length`.
///
/// `ratio` is the physical size of one screen pixel (pixel size divided by zoom). Returns
/// `0.0` when no length can be found, including for non-positive or non-finite inputs.
#[must_use]
pub fn solve(ratio: f64, max_screen_length: f64) -> f64 {
    if !(ratio.is_finite() && max_screen_length.is_finite())
        || ratio <= 0.0
        || max_screen_length <= 0.0
    {
        return 0.0;
    }

    let digits = ((max_screen_length * ratio).log10() + 1.0).floor();
    let mut length = 10_f64.powf(digits);

    let mut iterations = 0;
    while length / ratio > max_screen_length {
        length /= leading_divisor(length);
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return 0.0;
        }
    }
    trace!(ratio, max_screen_length, length, "solved ruler length");
    length
}

/// On-screen size, in screen pixels, of the solved ruler length.
#[must_use]
pub fn solve_screen_length(ratio: f64, max_screen_length: f64) -> f64 {
    let length = solve(ratio, max_screen_length);
    if length == 0.0 {
        0.0
    } else {
        length / ratio
    }
}

/// Orientation of a ruler drawn along one edge of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulerAxis {
    Horizontal,
    Vertical,
}

impl RulerAxis {
    /// Shortest on-screen length worth drawing.
    #[must_use]
    pub fn min_visible_length(self) -> f64 {
        match self {
            Self::Horizontal => 50.0,
            Self::Vertical => 30.0,
        }
    }
}

/// Geometry and label of a ruler, ready for a painter.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruler {
    pub axis: RulerAxis,
    /// Physical length in the calibration unit
    pub physical_length: f64,
    /// Length on screen in pixels
    pub screen_length: f64,
    pub label: DisplayLength,
    /// Number of major divisions
    pub divisions: u32,
}

impl Ruler {
    /// Lays out a ruler for an image with the given calibrated pixel size at `zoom`.
    ///
    /// `image_extent` is the image size in display pixels along the axis (already rescaled for
    /// square display pixels) and `view_extent` the size of the view along the same axis.
    /// Returns `None` when the ruler would be too short to be useful.
    #[must_use]
    pub fn layout(
        axis: RulerAxis,
        pixel_size: f64,
        zoom: f64,
        unit: Unit,
        image_extent: f64,
        view_extent: f64,
    ) -> Option<Self> {
        if zoom <= 0.0 {
            return None;
        }
        let ratio = pixel_size / zoom;
        let max_length = (zoom * image_extent).min(view_extent / 2.0).trunc();
        let physical_length = solve(ratio, max_length);
        let screen_length = if physical_length > 0.0 {
            physical_length / ratio
        } else {
            0.0
        };
        if screen_length <= axis.min_visible_length() {
            return None;
        }

        let label = format_length(physical_length, unit);
        let divisions = if label.text.contains('5') {
            5
        } else if label.text.contains('2') {
            2
        } else {
            10
        };

        Some(Self {
            axis,
            physical_length,
            screen_length,
            label,
            divisions,
        })
    }

    /// Offsets of the major ticks from the ruler origin, both ends included.
    #[must_use]
    pub fn major_ticks(&self) -> Vec<f64> {
        let step = self.screen_length / f64::from(self.divisions);
        (0..=self.divisions).map(|i| step * f64::from(i)).collect()
    }

    /// Offsets of the minor ticks, ten per major division, when divisions are wide enough.
    #[must_use]
    pub fn minor_ticks(&self) -> Vec<f64> {
        let step = self.screen_length / f64::from(self.divisions);
        if step <= 90.0 {
            return Vec::new();
        }
        let minor = step / 10.0;
        (0..self.divisions)
            .flat_map(|i| (1..10).map(move |k| step * f64::from(i) + minor * f64::from(k)))
            .collect()
    }
}
