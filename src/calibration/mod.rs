//! Physical pixel size, its unit and the unit of pixel values
//!
//! Spacing is resolved from an ordered chain of strategies (see [`resolvers`]); the first one
//! that applies wins. The value unit and the ultrasound region calibration are resolved
//! afterwards since the latter depends on whether a physical spacing was found.

pub mod resolvers;

use std::fmt;

use tracing::{debug, warn};

use crate::presentation::DisplayedArea;
use crate::types::PixelAspectRatio;
use crate::units::Unit;

pub use resolvers::{SpacingResolution, SpacingResolver, SPACING_CHAIN};

use dicom::dictionary_std::uids::SECONDARY_CAPTURE_IMAGE_STORAGE;

/// Relative tolerance used when comparing ultrasound X/Y deltas.
const DELTA_TOLERANCE: f64 = 1e-6;

/// Region Spatial Format (0018,6012): 2D tissue or flow
const REGION_SPATIAL_2D: u16 = 1;
/// Physical Units X/Y Direction (0018,6024/6026): centimeters
const REGION_UNITS_CM: u16 = 3;

/// One item of the Sequence of Ultrasound Regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UltrasoundRegion {
    pub spatial_format: u16,
    pub physical_units_x: u16,
    pub physical_units_y: u16,
    pub physical_delta_x: f64,
    pub physical_delta_y: f64,
}

impl UltrasoundRegion {
    #[inline]
    #[must_use]
    pub fn is_spatial_cm(&self) -> bool {
        self.spatial_format == REGION_SPATIAL_2D
            && self.physical_units_x == REGION_UNITS_CM
            && self.physical_units_y == REGION_UNITS_CM
    }
}

/// The metadata every calibration source is read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTags {
    pub modality: Option<String>,
    pub sop_class_uid: Option<String>,
    /// Pixel Spacing (0028,0030): row spacing, column spacing
    pub pixel_spacing: Option<Vec<f64>>,
    pub pixel_spacing_description: Option<String>,
    /// Imager Pixel Spacing (0018,1164), measured at the detector
    pub imager_pixel_spacing: Option<Vec<f64>>,
    pub nominal_scanned_pixel_spacing: Option<Vec<f64>>,
    pub magnification_factor: Option<f64>,
    pub distance_source_to_detector: Option<f64>,
    pub distance_source_to_patient: Option<f64>,
    pub pixel_aspect_ratio: Option<PixelAspectRatio>,
    pub rescale_type: Option<String>,
    pub units: Option<String>,
    pub ultrasound_regions: Vec<UltrasoundRegion>,
}

impl CalibrationTags {
    #[inline]
    #[must_use]
    pub fn is_modality(&self, modality: &str) -> bool {
        self.modality.as_deref() == Some(modality)
    }
}

/// Resolved calibration of one image. Immutable: overrides produce a new instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationInfo {
    pixel_size_x: f64,
    pixel_size_y: f64,
    unit: Unit,
    value_unit: Option<String>,
    description: Option<String>,
}

impl Default for CalibrationInfo {
    fn default() -> Self {
        Self {
            pixel_size_x: 1.0,
            pixel_size_y: 1.0,
            unit: Unit::Pixel,
            value_unit: None,
            description: None,
        }
    }
}

impl CalibrationInfo {
    /// Resolves the calibration of an image from its metadata. Never fails: when no source
    /// applies the result is 1.0 x 1.0 in `Pixel`.
    #[must_use]
    pub fn resolve(tags: &CalibrationTags) -> Self {
        Self::resolve_with(tags, SPACING_CHAIN)
    }

    /// Same as [`Self::resolve`] with an explicit strategy chain.
    #[must_use]
    pub fn resolve_with(tags: &CalibrationTags, chain: &[&dyn SpacingResolver]) -> Self {
        let mut info = Self::default();

        let resolved = chain
            .iter()
            .find_map(|resolver| resolver.resolve(tags).map(|found| (resolver.name(), found)));
        match resolved {
            Some((name, found)) => {
                debug!(
                    strategy = name,
                    x = found.x,
                    y = found.y,
                    unit = %found.unit,
                    "pixel spacing resolved"
                );
                info.pixel_size_x = found.x;
                info.pixel_size_y = found.y;
                info.unit = found.unit;
                info.description = found.description;
            }
            None => debug!("no pixel spacing source, using 1.0 x 1.0 pixel"),
        }

        info.value_unit = resolve_value_unit(tags);

        if info.unit == Unit::Pixel && tags.is_modality("US") {
            if let Some((dx, dy)) = unique_spatial_region(&tags.ultrasound_regions) {
                if approx_equal(dx, dy) {
                    info.pixel_size_x = dx;
                    info.pixel_size_y = dy;
                    info.unit = Unit::Centimeter;
                } else {
                    warn!(dx, dy, "anisotropic ultrasound calibration ignored");
                }
            }
        }

        info
    }

    #[must_use]
    pub fn new(pixel_size_x: f64, pixel_size_y: f64, unit: Unit) -> Self {
        Self {
            pixel_size_x,
            pixel_size_y,
            unit,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn pixel_size_x(&self) -> f64 {
        self.pixel_size_x
    }

    #[inline]
    #[must_use]
    pub fn pixel_size_y(&self) -> f64 {
        self.pixel_size_y
    }

    /// Isotropic pixel size used for display: the smaller of the two axes.
    #[inline]
    #[must_use]
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size_x.min(self.pixel_size_y)
    }

    /// Horizontal stretch needed to display square pixels.
    #[inline]
    #[must_use]
    pub fn rescale_x(&self) -> f64 {
        self.pixel_size_x / self.pixel_size()
    }

    /// Vertical stretch needed to display square pixels.
    #[inline]
    #[must_use]
    pub fn rescale_y(&self) -> f64 {
        self.pixel_size_y / self.pixel_size()
    }

    #[inline]
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    #[must_use]
    pub fn value_unit(&self) -> Option<&str> {
        self.value_unit.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.unit.is_physical()
    }

    /// Applies a presentation state displayed area. Presentation pixel spacing replaces the
    /// image spacing; a presentation aspect ratio only stretches uncalibrated images.
    #[must_use]
    pub fn with_displayed_area(&self, area: &DisplayedArea) -> Self {
        let mut info = self.clone();
        if let Some((x, y)) = area.pixel_spacing() {
            info.pixel_size_x = x;
            info.pixel_size_y = y;
            info.unit = Unit::Millimeter;
            info.description = None;
        } else if let Some(aspect) = area.aspect_ratio() {
            if !info.is_calibrated() && aspect.is_valid() && !aspect.is_square() {
                let (x, y) = aspect.stretch();
                info.pixel_size_x = x;
                info.pixel_size_y = y;
            }
        }
        info
    }
}

impl fmt::Display for CalibrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{x} x {y} {unit}",
            x = self.pixel_size_x,
            y = self.pixel_size_y,
            unit = self.unit
        )?;
        if let Some(description) = &self.description {
            write!(f, " ({description})")?;
        }
        Ok(())
    }
}

/// Rescale Type, else Units, else `HU` for CT images that are not secondary captures.
fn resolve_value_unit(tags: &CalibrationTags) -> Option<String> {
    let explicit = tags
        .rescale_type
        .as_deref()
        .or(tags.units.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(unit) = explicit {
        return Some(unit.to_string());
    }

    if tags.is_modality("CT") {
        let sop_class = tags.sop_class_uid.as_deref().map(str::trim).unwrap_or("");
        if !sop_class.is_empty() && !sop_class.starts_with(SECONDARY_CAPTURE_IMAGE_STORAGE) {
            return Some("HU".to_string());
        }
    }
    None
}

/// Deltas of the spatial calibration shared by all centimeter 2D regions, if they agree.
fn unique_spatial_region(regions: &[UltrasoundRegion]) -> Option<(f64, f64)> {
    let mut candidates = regions.iter().filter(|r| r.is_spatial_cm());
    let first = candidates.next()?;
    let dx = first.physical_delta_x.abs();
    let dy = first.physical_delta_y.abs();
    let consistent = candidates.all(|r| {
        approx_equal(r.physical_delta_x.abs(), dx) && approx_equal(r.physical_delta_y.abs(), dy)
    });
    (consistent && dx > 0.0 && dy > 0.0).then_some((dx, dy))
}

#[inline]
fn approx_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= DELTA_TOLERANCE * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ct_tags() -> CalibrationTags {
        CalibrationTags {
            modality: Some("CT".to_string()),
            sop_class_uid: Some("1.2.840.10008.5.1.4.1.1.2".to_string()),
            ..CalibrationTags::default()
        }
    }

    #[test]
    fn test_default_is_one_pixel() {
        let info = CalibrationInfo::resolve(&CalibrationTags::default());
        assert_eq!(info, CalibrationInfo::default());
        assert_eq!(info.unit(), Unit::Pixel);
        assert!(!info.is_calibrated());
    }

    #[test]
    fn test_pixel_spacing_swaps_axes() {
        let tags = CalibrationTags {
            pixel_spacing: Some(vec![0.5, 0.8]),
            pixel_spacing_description: Some("Geometry".to_string()),
            ..ct_tags()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_eq!(info.pixel_size_x(), 0.8);
        assert_eq!(info.pixel_size_y(), 0.5);
        assert_eq!(info.unit(), Unit::Millimeter);
        assert_eq!(info.description(), Some("Geometry"));
        assert_eq!(info.pixel_size(), 0.5);
        assert_relative_eq!(info.rescale_x(), 1.6);
        assert_eq!(info.rescale_y(), 1.0);
    }

    #[test]
    fn test_magnified_detector_spacing() {
        let tags = CalibrationTags {
            modality: Some("XA".to_string()),
            imager_pixel_spacing: Some(vec![0.2, 0.2]),
            magnification_factor: Some(1.5),
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_relative_eq!(info.pixel_size_x(), 0.2 / 1.5);
        assert_relative_eq!(info.pixel_size_y(), 0.2 / 1.5);
        assert_eq!(info.unit(), Unit::Millimeter);
        assert_eq!(info.description(), Some("Magnified"));
    }

    #[test]
    fn test_magnification_from_distances() {
        let tags = CalibrationTags {
            modality: Some("DX".to_string()),
            imager_pixel_spacing: Some(vec![0.3, 0.3]),
            distance_source_to_detector: Some(1200.0),
            distance_source_to_patient: Some(1000.0),
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_relative_eq!(info.pixel_size_x(), 0.25);
        assert_eq!(info.description(), Some("Magnified"));
    }

    #[test]
    fn test_detector_spacing_without_magnification() {
        let tags = CalibrationTags {
            modality: Some("OT".to_string()),
            imager_pixel_spacing: Some(vec![0.1, 0.2]),
            magnification_factor: Some(2.0),
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_eq!(info.pixel_size_x(), 0.2);
        assert_eq!(info.pixel_size_y(), 0.1);
        assert_eq!(info.description(), Some("At Detector"));
    }

    #[test]
    fn test_invalid_spacing_falls_through() {
        let tags = CalibrationTags {
            pixel_spacing: Some(vec![-0.5, 0.5]),
            nominal_scanned_pixel_spacing: Some(vec![0.1, 0.1]),
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_eq!(info.pixel_size_x(), 0.1);
        assert_eq!(info.description(), Some("At scanner"));
    }

    #[test]
    fn test_aspect_ratio_stretch() {
        let tags = CalibrationTags {
            pixel_aspect_ratio: Some(PixelAspectRatio::new(2, 1)),
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_eq!(info.pixel_size_x(), 1.0);
        assert_eq!(info.pixel_size_y(), 2.0);
        assert_eq!(info.unit(), Unit::Pixel);

        let square = CalibrationTags {
            pixel_aspect_ratio: Some(PixelAspectRatio::new(1, 1)),
            ..CalibrationTags::default()
        };
        assert_eq!(CalibrationInfo::resolve(&square), CalibrationInfo::default());
    }

    #[test]
    fn test_value_unit_precedence() {
        assert_eq!(CalibrationInfo::resolve(&ct_tags()).value_unit(), Some("HU"));

        let rescale_type = CalibrationTags {
            rescale_type: Some("OD".to_string()),
            units: Some("BQML".to_string()),
            ..ct_tags()
        };
        assert_eq!(CalibrationInfo::resolve(&rescale_type).value_unit(), Some("OD"));

        let pet = CalibrationTags {
            modality: Some("PT".to_string()),
            units: Some("BQML".to_string()),
            ..CalibrationTags::default()
        };
        assert_eq!(CalibrationInfo::resolve(&pet).value_unit(), Some("BQML"));

        let secondary_capture = CalibrationTags {
            sop_class_uid: Some("1.2.840.10008.5.1.4.1.1.7".to_string()),
            ..ct_tags()
        };
        assert_eq!(CalibrationInfo::resolve(&secondary_capture).value_unit(), None);
    }

    fn us_region(dx: f64, dy: f64) -> UltrasoundRegion {
        UltrasoundRegion {
            spatial_format: 1,
            physical_units_x: 3,
            physical_units_y: 3,
            physical_delta_x: dx,
            physical_delta_y: dy,
        }
    }

    #[test]
    fn test_ultrasound_region_calibration() {
        let tags = CalibrationTags {
            modality: Some("US".to_string()),
            ultrasound_regions: vec![us_region(0.02, -0.02)],
            ..CalibrationTags::default()
        };
        let info = CalibrationInfo::resolve(&tags);
        assert_eq!(info.pixel_size_x(), 0.02);
        assert_eq!(info.pixel_size_y(), 0.02);
        assert_eq!(info.unit(), Unit::Centimeter);
    }

    #[test]
    fn test_ultrasound_anisotropic_region_ignored() {
        let tags = CalibrationTags {
            modality: Some("US".to_string()),
            ultrasound_regions: vec![us_region(0.02, 0.03)],
            ..CalibrationTags::default()
        };
        assert_eq!(CalibrationInfo::resolve(&tags), CalibrationInfo::default());
    }

    #[test]
    fn test_ultrasound_conflicting_regions_ignored() {
        let tags = CalibrationTags {
            modality: Some("US".to_string()),
            ultrasound_regions: vec![us_region(0.02, 0.02), us_region(0.05, 0.05)],
            ..CalibrationTags::default()
        };
        assert_eq!(CalibrationInfo::resolve(&tags).unit(), Unit::Pixel);
    }

    #[test]
    fn test_displayed_area_override_is_new_instance() {
        let original = CalibrationInfo::resolve(&CalibrationTags {
            pixel_spacing: Some(vec![0.5, 0.5]),
            ..CalibrationTags::default()
        });
        let area = DisplayedArea {
            pixel_spacing: Some([0.3, 0.4]),
            ..DisplayedArea::default()
        };
        let overridden = original.with_displayed_area(&area);
        assert_eq!(overridden.pixel_size_x(), 0.4);
        assert_eq!(overridden.pixel_size_y(), 0.3);
        assert_eq!(original.pixel_size_x(), 0.5);
    }
}
