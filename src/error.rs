//! Error type for the radiometric pipeline
//!
//! Only structurally invalid numeric parameters fail. Absent metadata always has a
//! documented fallback and never surfaces as an error.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A caller supplied a parameter that can never be valid (non-positive window width,
    /// empty histogram domain, zero-length lookup table, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Pixel data or its statistics are not available yet
    #[error("Image data is not available")]
    MissingImageData,
}

impl RenderError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
