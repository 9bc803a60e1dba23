//! Overrides supplied by a presentation state or by the user
//!
//! The presentation collaborator only hands over values; this module does not parse
//! presentation state objects.

use std::str::FromStr;

use crate::types::PixelAspectRatio;
use crate::window::TransferShape;

/// Presentation Size Mode (0070,0100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationSizeMode {
    ScaleToFit,
    TrueSize,
    Magnify,
}

impl FromStr for PresentationSizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCALE TO FIT" => Ok(Self::ScaleToFit),
            "TRUE SIZE" => Ok(Self::TrueSize),
            "MAGNIFY" => Ok(Self::Magnify),
            other => Err(format!("Unknown presentation size mode: {other}")),
        }
    }
}

/// How the view should pick its zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomMode {
    /// Fit the displayed area into the view
    Fit,
    /// Explicit display pixels per image pixel
    Magnify(f64),
}

/// Displayed Area Selection of a presentation state, for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayedArea {
    /// Presentation Pixel Spacing: row spacing, column spacing
    pub pixel_spacing: Option<[f64; 2]>,
    pub aspect_ratio: Option<PixelAspectRatio>,
    pub size_mode: Option<PresentationSizeMode>,
    pub magnification_ratio: Option<f64>,
}

impl DisplayedArea {
    /// Presentation spacing as `(x, y)`, when both values are positive.
    #[must_use]
    pub fn pixel_spacing(&self) -> Option<(f64, f64)> {
        match self.pixel_spacing {
            Some([row, col]) if row > 0.0 && col > 0.0 => Some((col, row)),
            _ => None,
        }
    }

    #[must_use]
    pub fn aspect_ratio(&self) -> Option<PixelAspectRatio> {
        self.aspect_ratio
    }

    /// Zoom requested by the size mode. `TRUE SIZE` needs a calibrated screen and is not
    /// honoured, so the current zoom is kept.
    #[must_use]
    pub fn zoom(&self) -> Option<ZoomMode> {
        match self.size_mode? {
            PresentationSizeMode::ScaleToFit => Some(ZoomMode::Fit),
            PresentationSizeMode::Magnify => self
                .magnification_ratio
                .filter(|r| r.is_finite() && *r > 0.0)
                .map(ZoomMode::Magnify),
            PresentationSizeMode::TrueSize => None,
        }
    }
}

/// Everything a presentation state (or the user) may override for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationOverrides {
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
    pub shape: Option<TransferShape>,
    pub inverse_lut: Option<bool>,
    pub displayed_area: Option<DisplayedArea>,
}

impl PresentationOverrides {
    /// Center and width, only when both were supplied.
    #[must_use]
    pub fn window(&self) -> Option<(f64, f64)> {
        self.window_center.zip(self.window_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mode_zoom() {
        let area = DisplayedArea {
            size_mode: Some(PresentationSizeMode::Magnify),
            magnification_ratio: Some(2.0),
            ..DisplayedArea::default()
        };
        assert_eq!(area.zoom(), Some(ZoomMode::Magnify(2.0)));

        let fit = DisplayedArea {
            size_mode: Some("scale to fit".parse().unwrap()),
            ..DisplayedArea::default()
        };
        assert_eq!(fit.zoom(), Some(ZoomMode::Fit));

        let true_size = DisplayedArea {
            size_mode: Some(PresentationSizeMode::TrueSize),
            ..DisplayedArea::default()
        };
        assert_eq!(true_size.zoom(), None);
    }

    #[test]
    fn test_presentation_spacing_order() {
        let area = DisplayedArea {
            pixel_spacing: Some([0.2, 0.1]),
            ..DisplayedArea::default()
        };
        assert_eq!(area.pixel_spacing(), Some((0.1, 0.2)));
    }

    #[test]
    fn test_window_needs_both_values() {
        let partial = PresentationOverrides {
            window_center: Some(40.0),
            ..PresentationOverrides::default()
        };
        assert_eq!(partial.window(), None);
    }
}
