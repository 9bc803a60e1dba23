use clap::Parser;
use std::path::PathBuf;

use crate::lut::ColorRamp;
use crate::window::TransferShape;

/// Calibrated DICOM grayscale viewer for the terminal
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// DICOM file path(s) to display
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output width in terminal columns
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Output height in terminal rows
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Show DICOM metadata, calibration and presets
    #[arg(short, long)]
    pub verbose: bool,

    /// Zero-based frame of a multi-frame image
    #[arg(short, long, default_value_t = 0)]
    pub frame: u32,

    /// Preset to apply, by name or 1-based index (see --verbose)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Window center, overriding the preset
    #[arg(long, requires = "window_width", allow_negative_numbers = true)]
    pub window_center: Option<f64>,

    /// Window width, overriding the preset
    #[arg(long, requires = "window_center")]
    pub window_width: Option<f64>,

    /// Transfer function: LINEAR, SIGMOID, SIGMOID_NORM, LOG or LOG_INV
    #[arg(long)]
    pub shape: Option<TransferShape>,

    /// Invert the display lookup table
    #[arg(short, long)]
    pub invert: bool,

    /// Color ramp of the display lookup table
    #[arg(long, default_value_t = ColorRamp::Gray)]
    pub ramp: ColorRamp,

    /// Keep padding pixels in statistics and render them like any other value
    #[arg(long)]
    pub no_padding: bool,

    /// Print a histogram of the real values with this many bins
    #[arg(long, value_name = "BINS")]
    pub histogram: Option<usize>,

    /// Logarithmic histogram counts
    #[arg(long, requires = "histogram")]
    pub log_histogram: bool,

    /// Cumulative histogram counts
    #[arg(long, requires = "histogram")]
    pub accumulate: bool,

    /// Write the histogram as CSV to this path
    #[arg(long, value_name = "PATH", requires = "histogram")]
    pub histogram_csv: Option<PathBuf>,

    /// Magnification used for the ruler; defaults to the terminal fit
    #[arg(long)]
    pub zoom: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_flags() {
        let args = Args::try_parse_from([
            "dcmcal",
            "--window-center",
            "-600",
            "--window-width",
            "1500",
            "--shape",
            "SIGMOID",
            "--ramp",
            "hot",
            "a.dcm",
        ])
        .unwrap();
        assert_eq!(args.window_center, Some(-600.0));
        assert_eq!(args.window_width, Some(1500.0));
        assert_eq!(args.shape, Some(TransferShape::Sigmoid));
        assert_eq!(args.ramp, ColorRamp::Hot);
        assert_eq!(args.files, vec![PathBuf::from("a.dcm")]);
    }

    #[test]
    fn test_center_requires_width() {
        assert!(Args::try_parse_from(["dcmcal", "--window-center", "40", "a.dcm"]).is_err());
        assert!(Args::try_parse_from(["dcmcal", "--accumulate", "a.dcm"]).is_err());
    }
}
