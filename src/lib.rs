pub mod calibration;
pub mod cli;
pub mod config;
pub mod dicom;
pub mod display;
pub mod display_metadata;
pub mod element;
pub mod error;
pub mod geometry;
pub mod histogram;
pub mod logger;
pub mod lut;
pub mod modality;
pub mod presentation;
pub mod scale;
pub mod types;
pub mod units;
pub mod window;

// Re-export commonly used items
pub use display_metadata::print_metadata;
pub use element::{ImageAttributes, ImageElement};
pub use error::RenderError;
