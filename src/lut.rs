//! Display byte lookup tables
//!
//! A [`ByteLut`] holds three parallel byte channels. Tables are built from a base colour ramp
//! and a transfer shape, optionally inverted, and are never modified afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{RenderError, Result};
use crate::window::{ShapeKey, TransferShape};

/// Size of the tables built from named ramps.
pub const LUT_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteLut {
    channels: [Vec<u8>; 3],
    inverted: bool,
}

impl ByteLut {
    /// Fails when the channels are empty or of different lengths.
    pub fn from_channels(channels: [Vec<u8>; 3]) -> Result<Self> {
        let len = channels[0].len();
        if len == 0 || channels.iter().any(|c| c.len() != len) {
            return Err(RenderError::invalid("lookup table channels must be non-empty and equal"));
        }
        Ok(Self {
            channels,
            inverted: false,
        })
    }

    /// Identity ramp: `byte[i] = i` on every channel.
    #[must_use]
    pub fn grayscale() -> Self {
        let ramp: Vec<u8> = (0..=u8::MAX).collect();
        Self {
            channels: [ramp.clone(), ramp.clone(), ramp],
            inverted: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    #[inline]
    #[must_use]
    pub fn channel(&self, index: usize) -> &[u8] {
        &self.channels[index]
    }

    /// Channel bytes at `index`.
    #[inline]
    #[must_use]
    pub fn color(&self, index: usize) -> [u8; 3] {
        [
            self.channels[0][index],
            self.channels[1][index],
            self.channels[2][index],
        ]
    }

    /// Table index of a normalized intensity in `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn index_of(&self, normalized: f64) -> usize {
        let last = self.len() - 1;
        ((normalized.clamp(0.0, 1.0) * last as f64).round() as usize).min(last)
    }

    /// Builds a table of the same length as `ramp`: entry `i` is the ramp colour at the shaped
    /// position of `i`, or of `N - 1 - i` when inverted.
    pub fn build(shape: &TransferShape, ramp: &ByteLut, invert: bool) -> Result<Self> {
        let n = ramp.len();
        if n == 0 {
            return Err(RenderError::invalid("zero-length lookup table"));
        }
        let last = (n - 1) as f64;

        let mut channels = [vec![0_u8; n], vec![0_u8; n], vec![0_u8; n]];
        for i in 0..n {
            let j = if invert { n - 1 - i } else { i };
            let t = if n == 1 { 0.0 } else { j as f64 / last };
            let k = ((shape.curve(t) * last).round() as usize).min(n - 1);
            for (out, base) in channels.iter_mut().zip(&ramp.channels) {
                out[i] = base[k];
            }
        }
        Ok(Self {
            channels,
            inverted: invert,
        })
    }
}

/// Named base colour ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRamp {
    #[default]
    Gray,
    Red,
    Green,
    Blue,
    Hot,
    Hue,
}

impl ColorRamp {
    pub const ALL: [ColorRamp; 6] = [
        Self::Gray,
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Hot,
        Self::Hue,
    ];

    fn entry(self, i: u8) -> [u8; 3] {
        match self {
            Self::Gray => [i, i, i],
            Self::Red => [i, 0, 0],
            Self::Green => [0, i, 0],
            Self::Blue => [0, 0, i],
            Self::Hot => {
                let v = u16::from(i) * 3;
                let channel = |offset: u16| v.saturating_sub(offset).min(255) as u8;
                [channel(0), channel(255), channel(510)]
            }
            Self::Hue => hue_to_rgb(f64::from(i) / 255.0 * 300.0),
        }
    }

    /// The 256-entry table of this ramp.
    #[must_use]
    pub fn lut(self) -> ByteLut {
        if self == Self::Gray {
            return ByteLut::grayscale();
        }
        let mut channels: [Vec<u8>; 3] = std::array::from_fn(|_| Vec::with_capacity(LUT_SIZE));
        for i in 0..=u8::MAX {
            for (channel, value) in channels.iter_mut().zip(self.entry(i)) {
                channel.push(value);
            }
        }
        ByteLut {
            channels,
            inverted: false,
        }
    }
}

/// Fully saturated colour for a hue in degrees.
fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = (hue.rem_euclid(360.0)) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let byte = |v: f64| (v * 255.0).round() as u8;
    [byte(r), byte(g), byte(b)]
}

impl fmt::Display for ColorRamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gray => "gray",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Hot => "hot",
            Self::Hue => "hue",
        };
        f.write_str(name)
    }
}

impl FromStr for ColorRamp {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ramp| ramp.to_string().eq_ignore_ascii_case(s.trim()))
            .or_else(|| s.trim().eq_ignore_ascii_case("grey").then_some(Self::Gray))
            .ok_or_else(|| format!("Unknown color ramp: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LutKey {
    shape: ShapeKey,
    ramp: ColorRamp,
    invert: bool,
}

/// Tables of one image, built at most once per parameter combination.
#[derive(Debug, Default)]
pub struct LutCache {
    tables: Mutex<HashMap<LutKey, Arc<ByteLut>>>,
}

impl LutCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table or builds and stores it. Concurrent callers for the same key
    /// get the same `Arc`.
    pub fn get_or_build(
        &self,
        shape: &TransferShape,
        ramp: ColorRamp,
        invert: bool,
    ) -> Result<Arc<ByteLut>> {
        let key = LutKey {
            shape: shape.key(),
            ramp,
            invert,
        };
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lut) = tables.get(&key) {
            return Ok(Arc::clone(lut));
        }
        debug!(%shape, %ramp, invert, "building display lut");
        let lut = Arc::new(ByteLut::build(shape, &ramp.lut(), invert)?);
        tables.insert(key, Arc::clone(&lut));
        Ok(lut)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
