//! Pixel spacing sources, in precedence order

use crate::units::Unit;

use super::CalibrationTags;

/// Modalities whose detector spacing is subject to geometric magnification.
const MAGNIFIED_MODALITIES: [&str; 7] = ["CR", "DX", "IO", "MG", "PX", "RF", "XA"];

/// Spacing found by one strategy, already in `(x, y)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingResolution {
    pub x: f64,
    pub y: f64,
    pub unit: Unit,
    pub description: Option<String>,
}

/// One calibration source. Returns `None` when its tags are absent or unusable.
pub trait SpacingResolver {
    fn name(&self) -> &'static str;
    fn resolve(&self, tags: &CalibrationTags) -> Option<SpacingResolution>;
}

/// The default chain: explicit spacing, detector spacing, scanner spacing, aspect ratio.
pub const SPACING_CHAIN: &[&dyn SpacingResolver] = &[
    &ExplicitSpacing,
    &DetectorSpacing,
    &NominalScannedSpacing,
    &AspectRatioStretch,
];

/// A `row\column` spacing pair with both values strictly positive, returned as `(x, y)`.
fn positive_pair(values: Option<&Vec<f64>>) -> Option<(f64, f64)> {
    match values.map(Vec::as_slice) {
        Some(&[row, col]) if row > 0.0 && col > 0.0 => Some((col, row)),
        _ => None,
    }
}

/// Pixel Spacing (0028,0030)
pub struct ExplicitSpacing;

impl SpacingResolver for ExplicitSpacing {
    fn name(&self) -> &'static str {
        "pixel spacing"
    }

    fn resolve(&self, tags: &CalibrationTags) -> Option<SpacingResolution> {
        let (x, y) = positive_pair(tags.pixel_spacing.as_ref())?;
        Some(SpacingResolution {
            x,
            y,
            unit: Unit::Millimeter,
            description: tags.pixel_spacing_description.clone(),
        })
    }
}

/// Imager Pixel Spacing (0018,1164), corrected for magnification on projection modalities.
pub struct DetectorSpacing;

impl DetectorSpacing {
    /// Explicit estimated factor, else source-to-detector over source-to-patient distance.
    fn magnification(tags: &CalibrationTags) -> Option<f64> {
        let factor = tags.magnification_factor.or_else(|| {
            match (tags.distance_source_to_detector, tags.distance_source_to_patient) {
                (Some(sid), Some(sod)) if sod != 0.0 => Some(sid / sod),
                _ => None,
            }
        })?;
        (factor.is_finite() && factor > 0.0).then_some(factor)
    }
}

impl SpacingResolver for DetectorSpacing {
    fn name(&self) -> &'static str {
        "imager pixel spacing"
    }

    fn resolve(&self, tags: &CalibrationTags) -> Option<SpacingResolution> {
        let (x, y) = positive_pair(tags.imager_pixel_spacing.as_ref())?;

        let magnified = tags
            .modality
            .as_deref()
            .is_some_and(|m| MAGNIFIED_MODALITIES.contains(&m));
        if magnified {
            if let Some(factor) = Self::magnification(tags) {
                return Some(SpacingResolution {
                    x: x / factor,
                    y: y / factor,
                    unit: Unit::Millimeter,
                    description: Some("Magnified".to_string()),
                });
            }
        }

        Some(SpacingResolution {
            x,
            y,
            unit: Unit::Millimeter,
            description: Some("At Detector".to_string()),
        })
    }
}

/// Nominal Scanned Pixel Spacing (0018,2010), for digitized film
pub struct NominalScannedSpacing;

impl SpacingResolver for NominalScannedSpacing {
    fn name(&self) -> &'static str {
        "nominal scanned pixel spacing"
    }

    fn resolve(&self, tags: &CalibrationTags) -> Option<SpacingResolution> {
        let (x, y) = positive_pair(tags.nominal_scanned_pixel_spacing.as_ref())?;
        Some(SpacingResolution {
            x,
            y,
            unit: Unit::Millimeter,
            description: Some("At scanner".to_string()),
        })
    }
}

/// Pixel Aspect Ratio (0028,0034): uncalibrated, only stretches one axis.
pub struct AspectRatioStretch;

impl SpacingResolver for AspectRatioStretch {
    fn name(&self) -> &'static str {
        "pixel aspect ratio"
    }

    fn resolve(&self, tags: &CalibrationTags) -> Option<SpacingResolution> {
        let aspect = tags.pixel_aspect_ratio.filter(|a| a.is_valid() && !a.is_square())?;
        let (x, y) = aspect.stretch();
        Some(SpacingResolution {
            x,
            y,
            unit: Unit::Pixel,
            description: None,
        })
    }
}
