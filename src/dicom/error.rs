use crate::dicom::DicomMetadata;
use thiserror::Error;

/// Error type that preserves metadata when available
#[derive(Error, Debug)]
pub enum ProcessError {
    /// File is not a DICOM image - no metadata available
    #[error("{0}")]
    NotADicomFile(String),

    /// DICOM image but extraction failed - only descriptive tags available
    #[error("{0}")]
    ExtractionFailed(String),

    /// Metadata extracted successfully, but rendering failed
    #[error("{error}")]
    ConversionFailed {
        metadata: Box<DicomMetadata>,
        error: String,
    },

    /// Image ready but display failed
    #[error("{error}")]
    DisplayFailed {
        metadata: Box<DicomMetadata>,
        error: String,
    },
}

impl ProcessError {
    /// Returns metadata if available (for verbose display before error)
    pub fn metadata(&self) -> Option<&DicomMetadata> {
        match self {
            ProcessError::ConversionFailed { metadata, .. }
            | ProcessError::DisplayFailed { metadata, .. } => Some(metadata),
            _ => None,
        }
    }
}
