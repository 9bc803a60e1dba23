use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use viuer::{print, Config as ViuerConfig};
use crate::calibration::CalibrationInfo;
use crate::cli::Args;
use crate::scale::{Ruler, RulerAxis};
use std::io::{IsTerminal, Write};

/// Width of one terminal cell in screen pixels, used to lay out rulers.
pub const CELL_PIXELS: f64 = 8.0;

const DEFAULT_COLUMNS: u32 = 24;

/// Resamples to square display pixels when the calibrated pixel is not square.
#[must_use]
pub fn to_square_pixels(image: RgbImage, calibration: &CalibrationInfo) -> RgbImage {
    let (sx, sy) = (calibration.rescale_x(), calibration.rescale_y());
    if sx == 1.0 && sy == 1.0 {
        return image;
    }
    let width = (f64::from(image.width()) * sx).round().max(1.0) as u32;
    let height = (f64::from(image.height()) * sy).round().max(1.0) as u32;
    imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Terminal columns the image is printed across.
#[must_use]
pub fn output_columns(image: &RgbImage, args: &Args) -> u32 {
    match (args.width, args.height) {
        (Some(w), _) => w,
        (None, Some(h)) => {
            // Half-block rendering: one row is two pixels tall
            let aspect = f64::from(image.width()) / f64::from(image.height().max(1));
            (f64::from(h) * 2.0 * aspect).round().max(1.0) as u32
        }
        (None, None) => DEFAULT_COLUMNS,
    }
}

/// Screen pixels per display pixel for an image printed across `columns`.
#[must_use]
pub fn fit_zoom(image_width: u32, columns: u32) -> f64 {
    f64::from(columns) * CELL_PIXELS / f64::from(image_width.max(1))
}

pub fn print_image(image: &RgbImage, args: &Args) -> Result<()> {
    let is_tty = std::io::stdout().is_terminal();

    let config = ViuerConfig {
        width: Some(output_columns(image, args)),
        height: None,
        absolute_offset: false,
        use_kitty: is_tty,
        use_iterm: is_tty,
        use_sixel: is_tty,
        ..Default::default()
    };

    std::io::stdout().flush()
        .map_err(|e| anyhow!("Failed to flush stdout: {e}"))?;

    print(&DynamicImage::ImageRgb8(image.clone()), &config)
        .map_err(|e| anyhow!("Failed to display image: {e}"))?;

    Ok(())
}

/// Terminal width in screen pixels, falling back to 80 columns.
#[must_use]
pub fn terminal_extent() -> f64 {
    let columns = crossterm::terminal::size().map_or(80, |(cols, _)| cols);
    f64::from(columns) * CELL_PIXELS
}

/// One-line text rendering of a horizontal ruler: `|----+----|  5 cm`.
#[must_use]
pub fn format_ruler(ruler: &Ruler) -> String {
    let cells = (ruler.screen_length / CELL_PIXELS).round().max(1.0) as usize;
    let ticks: Vec<usize> = ruler
        .major_ticks()
        .iter()
        .map(|offset| ((offset / CELL_PIXELS).round() as usize).min(cells))
        .collect();

    let mut bar: Vec<char> = vec!['-'; cells + 1];
    for tick in ticks {
        bar[tick] = '+';
    }
    bar[0] = '|';
    bar[cells] = '|';

    let bar: String = bar.into_iter().collect();
    match ruler.axis {
        RulerAxis::Horizontal => format!("{bar}  {}", ruler.label),
        RulerAxis::Vertical => format!("{} (vertical, {} cells)", ruler.label, cells),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    #[test]
    fn test_square_pixels() {
        let image = RgbImage::new(10, 10);
        let calibration = CalibrationInfo::new(1.0, 2.0, Unit::Millimeter);
        let resized = to_square_pixels(image, &calibration);
        assert_eq!((resized.width(), resized.height()), (10, 20));

        let square = to_square_pixels(RgbImage::new(7, 5), &CalibrationInfo::default());
        assert_eq!((square.width(), square.height()), (7, 5));
    }

    #[test]
    fn test_output_columns() {
        let image = RgbImage::new(200, 100);
        let mut args = Args::default();
        assert_eq!(output_columns(&image, &args), DEFAULT_COLUMNS);
        args.height = Some(10);
        assert_eq!(output_columns(&image, &args), 40);
        args.width = Some(30);
        assert_eq!(output_columns(&image, &args), 30);
    }

    #[test]
    fn test_format_ruler() {
        let ruler = Ruler::layout(RulerAxis::Horizontal, 1.0, 1.0, Unit::Millimeter, 512.0, 400.0)
            .unwrap();
        let text = format_ruler(&ruler);
        assert!(text.starts_with('|'));
        assert!(text.ends_with(&ruler.label.to_string()));
        assert_eq!(text.matches('+').count() + 2, ruler.divisions as usize + 1);
    }
}
