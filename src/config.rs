//! Display preferences shared by every image view
//!
//! A [`DisplayConfig`] is an immutable snapshot handed to rendering calls. Views that follow
//! a common setting read it through a [`SharedDisplayConfig`] and compare generations to
//! notice updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::lut::ColorRamp;

/// Generation number of a configuration snapshot.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub ramp: ColorRamp,
    /// Exclude padding pixels from statistics and paint them with the sentinel
    pub apply_padding: bool,
    /// Invert the display lookup table on top of the photometric inversion
    pub inverse_lut: bool,
    /// Report the nominal range of 8-bit images instead of scanning them
    pub exclude_low_bit_depth: bool,
    pub histogram_bins: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            ramp: ColorRamp::Gray,
            apply_padding: true,
            inverse_lut: false,
            exclude_low_bit_depth: true,
            histogram_bins: 256,
        }
    }
}

/// Current configuration and the generation it was published at.
#[derive(Debug, Default)]
pub struct SharedDisplayConfig {
    current: RwLock<Arc<DisplayConfig>>,
    generation: AtomicU64,
}

impl SharedDisplayConfig {
    #[must_use]
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot. Holders keep a consistent view after later updates.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DisplayConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation.load(Ordering::Acquire)
    }

    /// Publishes a new snapshot derived from the current one and returns its generation.
    pub fn update(&self, change: impl FnOnce(&mut DisplayConfig)) -> Generation {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = DisplayConfig::clone(&current);
        change(&mut next);
        *current = Arc::new(next);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "display configuration updated");
        generation
    }

    /// Whether updates were published after `seen`.
    #[must_use]
    pub fn is_newer_than(&self, seen: Generation) -> bool {
        self.generation() > seen
    }
}
