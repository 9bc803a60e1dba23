//! One displayable grayscale image with its lazily derived state
//!
//! Calibration, presets and the shape collection are computed once on first access. Lookup
//! tables are cached per parameter combination. A new frame means a new element.

use std::sync::{Arc, OnceLock};

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::calibration::{CalibrationInfo, CalibrationTags};
use crate::config::DisplayConfig;
use crate::error::Result;
use crate::geometry::SliceGeometry;
use crate::histogram::Histogram;
use crate::lut::{ByteLut, ColorRamp, LutCache};
use crate::modality::{FrameBuffer, PixelValueMapper};
use crate::presentation::PresentationOverrides;
use crate::scale::{Ruler, RulerAxis};
use crate::window::{
    default_preset, shape_collection, Preset, PresetSources, TransferShape, WindowLevel,
};

/// Metadata of an image that the display pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    pub calibration: CalibrationTags,
    pub presets: PresetSources,
    /// Modality transform, padding and MONOCHROME1 inversion
    pub mapper: PixelValueMapper,
    pub orientation: Option<Vec<f64>>,
    pub position: Option<Vec<f64>>,
    pub slice_thickness: Option<f64>,
}

#[derive(Debug)]
pub struct ImageElement {
    attributes: ImageAttributes,
    frame: FrameBuffer,
    calibration: OnceLock<CalibrationInfo>,
    presets: OnceLock<Vec<Preset>>,
    shapes: OnceLock<Vec<TransferShape>>,
    luts: LutCache,
}

impl ImageElement {
    #[must_use]
    pub fn new(attributes: ImageAttributes, frame: FrameBuffer) -> Self {
        Self {
            attributes,
            frame,
            calibration: OnceLock::new(),
            presets: OnceLock::new(),
            shapes: OnceLock::new(),
            luts: LutCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &ImageAttributes {
        &self.attributes
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    #[inline]
    #[must_use]
    pub fn mapper(&self) -> &PixelValueMapper {
        &self.attributes.mapper
    }

    #[must_use]
    pub fn calibration(&self) -> &CalibrationInfo {
        self.calibration
            .get_or_init(|| CalibrationInfo::resolve(&self.attributes.calibration))
    }

    /// Calibration with the presentation overrides applied, as a new instance.
    #[must_use]
    pub fn calibration_with(&self, overrides: &PresentationOverrides) -> CalibrationInfo {
        match &overrides.displayed_area {
            Some(area) => self.calibration().with_displayed_area(area),
            None => self.calibration().clone(),
        }
    }

    /// Real min/max of the frame under `config`.
    #[must_use]
    pub fn min_max(&self, config: &DisplayConfig) -> (f64, f64) {
        self.mapper()
            .min_max(&self.frame, config.apply_padding, config.exclude_low_bit_depth)
    }

    /// Presets over the intrinsic value range (padding excluded).
    #[must_use]
    pub fn presets(&self) -> &[Preset] {
        self.presets.get_or_init(|| {
            let (min, max) = self.mapper().min_max(&self.frame, true, true);
            Preset::collection(&self.attributes.presets, min, max)
        })
    }

    #[must_use]
    pub fn default_preset(&self) -> Preset {
        let (min, max) = self.mapper().min_max(&self.frame, true, true);
        default_preset(self.presets(), min, max)
    }

    #[must_use]
    pub fn shapes(&self) -> &[TransferShape] {
        self.shapes.get_or_init(|| shape_collection(self.presets()))
    }

    /// Window from the named preset (or the default one) with the overrides applied on top.
    pub fn window(
        &self,
        preset: Option<&str>,
        overrides: &PresentationOverrides,
    ) -> Result<WindowLevel> {
        let base = match preset.and_then(|name| Preset::find(self.presets(), name)) {
            Some(found) => found.clone(),
            None => {
                if let Some(name) = preset {
                    debug!(name, "preset not found, using default");
                }
                self.default_preset()
            }
        };

        let mut window = base.window;
        if let Some(shape) = &overrides.shape {
            window = window.with_shape(shape.clone());
        }
        if let Some((center, width)) = overrides.window() {
            window = window.with_window(center, width)?;
        }
        Ok(window)
    }

    /// Whether the display table is inverted: photometric inversion toggled by the user.
    #[must_use]
    pub fn is_inverted(&self, overrides: &PresentationOverrides, config: &DisplayConfig) -> bool {
        let inverse_lut = overrides.inverse_lut.unwrap_or(config.inverse_lut);
        self.mapper().is_inverted() ^ inverse_lut
    }

    pub fn lut(&self, shape: &TransferShape, ramp: ColorRamp, invert: bool) -> Result<Arc<ByteLut>> {
        self.luts.get_or_build(shape, ramp, invert)
    }

    /// Renders the frame: stored, real, normalized, then through the display table.
    pub fn render(
        &self,
        window: &WindowLevel,
        overrides: &PresentationOverrides,
        config: &DisplayConfig,
    ) -> Result<RgbImage> {
        let invert = self.is_inverted(overrides, config);
        let lut = self.lut(&TransferShape::Linear, config.ramp, invert)?;
        let mapper = self.mapper();
        let padding_index = if invert { lut.len() - 1 } else { 0 };

        let dims = self.frame.dimensions();
        let cols = u32::from(dims.cols);
        let values = self.frame.values();
        debug!(%window, invert, ramp = %config.ramp, "rendering frame {}", self.frame.index());

        Ok(RgbImage::from_fn(cols, u32::from(dims.rows), |x, y| {
            let stored = values[(y * cols + x) as usize];
            let index = if config.apply_padding && mapper.is_padding(stored) {
                padding_index
            } else {
                lut.index_of(window.normalize(mapper.to_real_value(stored, false)))
            };
            Rgb(lut.color(index))
        }))
    }

    pub fn histogram(&self, window: &WindowLevel, config: &DisplayConfig) -> Result<Histogram> {
        Histogram::from_frame(
            &self.frame,
            self.mapper(),
            window,
            config.histogram_bins,
            config.apply_padding,
        )
    }

    #[must_use]
    pub fn slice_geometry(&self, display: bool) -> Option<SliceGeometry> {
        let dims = self.frame.dimensions();
        SliceGeometry::new(
            self.attributes.orientation.as_deref()?,
            self.attributes.position.as_deref()?,
            self.attributes.slice_thickness,
            dims.rows,
            dims.cols,
            self.calibration(),
            display,
        )
    }

    /// Ruler along one axis at `zoom` for a view of `view_extent` screen pixels.
    #[must_use]
    pub fn ruler(
        &self,
        calibration: &CalibrationInfo,
        axis: RulerAxis,
        zoom: f64,
        view_extent: f64,
    ) -> Option<Ruler> {
        let dims = self.frame.dimensions();
        let image_extent = match axis {
            RulerAxis::Horizontal => f64::from(dims.cols) * calibration.rescale_x(),
            RulerAxis::Vertical => f64::from(dims.rows) * calibration.rescale_y(),
        };
        Ruler::layout(
            axis,
            calibration.pixel_size(),
            zoom,
            calibration.unit(),
            image_extent,
            view_extent,
        )
    }
}
