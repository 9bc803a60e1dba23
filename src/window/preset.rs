//! Named window/level presets of an image

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SequenceLut, ShapeKey, TransferShape, WindowLevel};

/// Built-in presets per modality: name, center, width.
const LIBRARY: &[(&str, &str, f64, f64)] = &[
    ("CT", "Brain", 40.0, 80.0),
    ("CT", "Abdomen", 50.0, 400.0),
    ("CT", "Lung", -650.0, 1500.0),
    ("CT", "Mediastinum", 40.0, 350.0),
    ("CT", "Bone", 400.0, 1800.0),
    ("CT", "Liver", 30.0, 150.0),
    ("CT", "Stroke", 32.0, 8.0),
];

pub const AUTO_PRESET_NAME: &str = "Auto Level [Image]";

/// One Window Center/Width pair of the image with its explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiWindowTag {
    pub center: f64,
    pub width: f64,
    pub explanation: Option<String>,
}

/// Everything presets are built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetSources {
    pub windows: Vec<VoiWindowTag>,
    /// VOI LUT Function (0028,1056), applied to every window pair
    pub voi_function: Option<TransferShape>,
    pub voi_luts: Vec<Arc<SequenceLut>>,
    pub modality: Option<String>,
}

/// Where a preset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetOrigin {
    Dicom,
    VoiLut,
    Auto,
    Library,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub window: WindowLevel,
    pub origin: PresetOrigin,
}

impl Preset {
    #[inline]
    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.origin == PresetOrigin::Auto
    }

    /// Builds the ordered preset collection of an image: DICOM windows, VOI LUTs, the
    /// automatic preset, then the library presets of the modality. Never empty.
    #[must_use]
    pub fn collection(sources: &PresetSources, min: f64, max: f64) -> Vec<Preset> {
        let mut presets = Vec::new();
        let shape = sources.voi_function.clone().unwrap_or(TransferShape::Linear);

        for (i, tag) in sources.windows.iter().enumerate() {
            match WindowLevel::covering(tag.center, tag.width, shape.clone(), min, max) {
                Ok(window) => presets.push(Preset {
                    name: tag
                        .explanation
                        .clone()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| format!("[DICOM] {}", i + 1)),
                    window,
                    origin: PresetOrigin::Dicom,
                }),
                Err(err) => warn!(center = tag.center, width = tag.width, %err, "window tag skipped"),
            }
        }

        for (i, lut) in sources.voi_luts.iter().enumerate() {
            let (lo, hi) = lut.domain();
            let center = (lo + hi) / 2.0;
            let width = hi - lo + 1.0;
            let shape = TransferShape::Sequence(Arc::clone(lut));
            match WindowLevel::covering(center, width, shape, min, max) {
                Ok(window) => presets.push(Preset {
                    name: lut
                        .explanation
                        .clone()
                        .unwrap_or_else(|| format!("[DICOM] VOI LUT {}", i + 1)),
                    window,
                    origin: PresetOrigin::VoiLut,
                }),
                Err(err) => warn!(%err, "VOI LUT skipped"),
            }
        }

        presets.push(Preset {
            name: AUTO_PRESET_NAME.to_string(),
            window: WindowLevel::auto(min, max),
            origin: PresetOrigin::Auto,
        });

        if let Some(modality) = sources.modality.as_deref() {
            presets.extend(
                LIBRARY
                    .iter()
                    .filter(|(m, ..)| *m == modality)
                    .filter_map(|&(_, name, center, width)| {
                        WindowLevel::covering(center, width, TransferShape::Linear, min, max)
                            .ok()
                            .map(|window| Preset {
                                name: name.to_string(),
                                window,
                                origin: PresetOrigin::Library,
                            })
                    }),
            );
        }

        debug!(count = presets.len(), "presets built");
        presets
    }

    /// Finds a preset by case-insensitive name, or by its 1-based position.
    #[must_use]
    pub fn find<'a>(presets: &'a [Preset], query: &str) -> Option<&'a Preset> {
        presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(query.trim()))
            .or_else(|| {
                query
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| presets.get(i))
            })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.window)
    }
}

/// The default preset: the first one, or an automatic window over `[min, max]`.
#[must_use]
pub fn default_preset(presets: &[Preset], min: f64, max: f64) -> Preset {
    presets.first().cloned().unwrap_or_else(|| Preset {
        name: AUTO_PRESET_NAME.to_string(),
        window: WindowLevel::auto(min, max),
        origin: PresetOrigin::Auto,
    })
}

/// Shapes used by the presets followed by the default shapes, without duplicates.
#[must_use]
pub fn shape_collection(presets: &[Preset]) -> Vec<TransferShape> {
    let mut seen: Vec<ShapeKey> = Vec::new();
    presets
        .iter()
        .map(|p| p.window.shape().clone())
        .chain(TransferShape::defaults())
        .filter(|shape| {
            let key = shape.key();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}
