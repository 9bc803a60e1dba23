//! Window/level and transfer function shapes
//!
//! A [`WindowLevel`] maps a real value (after the modality transform) to a normalized display
//! intensity in `[0, 1]` through one of the closed set of [`TransferShape`]s.

pub mod preset;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{RenderError, Result};

pub use preset::{default_preset, shape_collection, Preset, PresetOrigin, PresetSources, VoiWindowTag};

/// Steepness of the logarithmic shapes.
const LOG_FACTOR: f64 = 10.0;

/// An explicit VOI lookup table (VOI LUT Sequence item).
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceLut {
    /// Real value mapped to the first entry
    pub first_mapped: i64,
    /// Number of significant bits of each entry
    pub bits: u8,
    pub entries: Vec<u16>,
    pub explanation: Option<String>,
}

impl SequenceLut {
    pub fn new(first_mapped: i64, bits: u8, entries: Vec<u16>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RenderError::invalid("lookup table has no entries"));
        }
        if !(1..=16).contains(&bits) {
            return Err(RenderError::invalid(format!("lookup table bit depth {bits}")));
        }
        Ok(Self {
            first_mapped,
            bits,
            entries,
            explanation: None,
        })
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = explanation;
        self
    }

    /// Real value domain covered by the table.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        let first = self.first_mapped as f64;
        (first, first + (self.entries.len() - 1) as f64)
    }

    #[inline]
    fn max_output(&self) -> f64 {
        f64::from((1_u32 << self.bits) - 1)
    }

    /// Raw table entry for a value, clamped to the first/last entry.
    #[must_use]
    pub fn entry(&self, value: f64) -> u16 {
        let last = (self.entries.len() - 1) as f64;
        let index = (value.round() - self.first_mapped as f64).clamp(0.0, last) as usize;
        self.entries[index]
    }

    /// Entry for a real value, normalized by the table bit depth.
    #[must_use]
    pub fn lookup(&self, real: f64) -> f64 {
        f64::from(self.entry(real)) / self.max_output()
    }

    /// Entry at a fractional position `t` in `[0, 1]` of the table.
    #[must_use]
    pub fn lookup_fraction(&self, t: f64) -> f64 {
        let last = (self.entries.len() - 1) as f64;
        let index = (t.clamp(0.0, 1.0) * last).round() as usize;
        f64::from(self.entries[index]) / self.max_output()
    }

    /// Stable fingerprint of the table contents, used as a cache key.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.first_mapped.hash(&mut hasher);
        self.bits.hash(&mut hasher);
        self.entries.hash(&mut hasher);
        hasher.finish()
    }
}

/// Transfer function shape. The set is closed: one evaluation per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferShape {
    Linear,
    Sigmoid,
    SigmoidNormalized,
    Log,
    LogInverse,
    Sequence(Arc<SequenceLut>),
}

/// Hashable identity of a shape, used to key caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKey {
    Linear,
    Sigmoid,
    SigmoidNormalized,
    Log,
    LogInverse,
    Sequence(u64),
}

impl TransferShape {
    /// Shapes offered for every image, in menu order.
    #[must_use]
    pub fn defaults() -> [TransferShape; 5] {
        [
            Self::Linear,
            Self::Sigmoid,
            Self::SigmoidNormalized,
            Self::Log,
            Self::LogInverse,
        ]
    }

    #[must_use]
    pub fn key(&self) -> ShapeKey {
        match self {
            Self::Linear => ShapeKey::Linear,
            Self::Sigmoid => ShapeKey::Sigmoid,
            Self::SigmoidNormalized => ShapeKey::SigmoidNormalized,
            Self::Log => ShapeKey::Log,
            Self::LogInverse => ShapeKey::LogInverse,
            Self::Sequence(lut) => ShapeKey::Sequence(lut.fingerprint()),
        }
    }

    /// Evaluates the shape on a fraction `t` of a unit window (`0` at the lower edge, `1` at
    /// the upper edge). Used to shape byte lookup tables.
    #[must_use]
    pub fn curve(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let value = match self {
            Self::Linear => t,
            Self::Sigmoid => logistic(t - 0.5, 1.0),
            Self::SigmoidNormalized => sigmoid_normalized(t - 0.5, 1.0),
            Self::Log => log_curve(t),
            Self::LogInverse => 1.0 - log_curve(1.0 - t),
            Self::Sequence(lut) => lut.lookup_fraction(t),
        };
        value.clamp(0.0, 1.0)
    }
}

impl fmt::Display for TransferShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "LINEAR"),
            Self::Sigmoid => write!(f, "SIGMOID"),
            Self::SigmoidNormalized => write!(f, "SIGMOID_NORM"),
            Self::Log => write!(f, "LOG"),
            Self::LogInverse => write!(f, "LOG_INV"),
            Self::Sequence(lut) => match &lut.explanation {
                Some(explanation) => write!(f, "SEQUENCE [{explanation}]"),
                None => write!(f, "SEQUENCE"),
            },
        }
    }
}

impl FromStr for TransferShape {
    type Err = String;

    /// Parses the function names; `SEQUENCE` needs a table and cannot be parsed.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "LINEAR" | "LINEAR_EXACT" => Self::Linear,
            "SIGMOID" => Self::Sigmoid,
            "SIGMOID_NORM" | "SIGMOID_NORMALIZED" => Self::SigmoidNormalized,
            "LOG" => Self::Log,
            "LOG_INV" | "LOG_INVERSE" => Self::LogInverse,
            other => return Err(format!("Unknown transfer function: {other}")),
        })
    }
}

#[inline]
fn logistic(offset: f64, width: f64) -> f64 {
    1.0 / (1.0 + (-4.0 * offset / width).exp())
}

/// Logistic curve rescaled so the window edges map exactly to 0 and 1.
#[inline]
fn sigmoid_normalized(offset: f64, width: f64) -> f64 {
    let low = logistic(-width / 2.0, width);
    let high = logistic(width / 2.0, width);
    (logistic(offset, width) - low) / (high - low)
}

#[inline]
fn log_curve(t: f64) -> f64 {
    LOG_FACTOR.mul_add(t, 1.0).ln() / (1.0 + LOG_FACTOR).ln()
}

/// Window center/width with the shape applied inside the window and the valid value domain.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowLevel {
    center: f64,
    width: f64,
    shape: TransferShape,
    level_min: f64,
    level_max: f64,
}

impl WindowLevel {
    /// Fails with `InvalidParameter` when `width` is not strictly positive or when the domain
    /// is empty (`level_min >= level_max`).
    pub fn new(
        center: f64,
        width: f64,
        shape: TransferShape,
        level_min: f64,
        level_max: f64,
    ) -> Result<Self> {
        if !(width.is_finite() && width > 0.0) {
            return Err(RenderError::invalid(format!("window width {width}")));
        }
        if !center.is_finite() {
            return Err(RenderError::invalid(format!("window center {center}")));
        }
        if level_min.is_nan() || level_max.is_nan() || level_min >= level_max {
            return Err(RenderError::invalid(format!(
                "level range [{level_min}, {level_max}]"
            )));
        }
        Ok(Self {
            center,
            width,
            shape,
            level_min,
            level_max,
        })
    }

    /// Window whose domain is extended to cover both the window and the image value range.
    pub fn covering(
        center: f64,
        width: f64,
        shape: TransferShape,
        min_value: f64,
        max_value: f64,
    ) -> Result<Self> {
        let level_min = (center - width / 2.0).min(min_value);
        let level_max = (center + width / 2.0).max(max_value);
        Self::new(center, width, shape, level_min, level_max)
    }

    /// Linear window spanning `[min, max]`: `center = (min + max) / 2`, `width = max - min + 1`.
    ///
    /// An unusable range (not finite or reversed) falls back to `[0, 0]`.
    #[must_use]
    pub fn auto(min_value: f64, max_value: f64) -> Self {
        let (min_value, max_value) =
            if min_value.is_finite() && max_value.is_finite() && min_value <= max_value {
                (min_value, max_value)
            } else {
                (0.0, 0.0)
            };
        let center = (min_value + max_value) / 2.0;
        let width = max_value - min_value + 1.0;
        Self {
            center,
            width,
            shape: TransferShape::Linear,
            level_min: min_value.min(center - width / 2.0),
            level_max: max_value.max(center + width / 2.0),
        }
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> f64 {
        self.center
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &TransferShape {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn level_min(&self) -> f64 {
        self.level_min
    }

    #[inline]
    #[must_use]
    pub fn level_max(&self) -> f64 {
        self.level_max
    }

    #[inline]
    #[must_use]
    pub fn lower(&self) -> f64 {
        self.center - self.width / 2.0
    }

    #[inline]
    #[must_use]
    pub fn upper(&self) -> f64 {
        self.center + self.width / 2.0
    }

    /// New window with another center/width, same shape, domain widened if needed.
    pub fn with_window(&self, center: f64, width: f64) -> Result<Self> {
        Self::new(
            center,
            width,
            self.shape.clone(),
            self.level_min.min(center - width / 2.0),
            self.level_max.max(center + width / 2.0),
        )
    }

    #[must_use]
    pub fn with_shape(&self, shape: TransferShape) -> Self {
        Self {
            shape,
            ..self.clone()
        }
    }

    /// Normalized display intensity of `real`, always in `[0, 1]`.
    #[must_use]
    pub fn normalize(&self, real: f64) -> f64 {
        if real.is_nan() {
            return 0.0;
        }
        let x = real.clamp(self.level_min, self.level_max);
        let value = match &self.shape {
            TransferShape::Linear => self.fraction(x),
            TransferShape::Sigmoid => logistic(x - self.center, self.width),
            TransferShape::SigmoidNormalized => {
                // Evaluated on the same inputs as the edges so that the edges are exact.
                let low = logistic(self.lower() - self.center, self.width);
                let high = logistic(self.upper() - self.center, self.width);
                (logistic(x - self.center, self.width) - low) / (high - low)
            }
            TransferShape::Log => log_curve(self.fraction(x)),
            TransferShape::LogInverse => 1.0 - log_curve(1.0 - self.fraction(x)),
            TransferShape::Sequence(lut) => lut.lookup(x),
        };
        value.clamp(0.0, 1.0)
    }

    /// Position of `x` inside the window; the edges map to exactly 0 and 1.
    #[inline]
    fn fraction(&self, x: f64) -> f64 {
        let (lower, upper) = (self.lower(), self.upper());
        if x <= lower {
            0.0
        } else if x >= upper {
            1.0
        } else {
            ((x - lower) / (upper - lower)).clamp(0.0, 1.0)
        }
    }
}

/// Free-function form of [`WindowLevel::normalize`].
#[must_use]
pub fn normalize(real: f64, wl: &WindowLevel) -> f64 {
    wl.normalize(real)
}

impl fmt::Display for WindowLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "W {width} L {center} [{shape}]",
            width = self.width,
            center = self.center,
            shape = self.shape
        )
    }
}
