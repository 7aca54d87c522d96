//! Error types for task extraction and sheet synchronization.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning a deck or materializing sheets.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Required settings are missing or point at something unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A slide's markers are structurally incomplete.
    #[error("Slide {slide} is invalid: {issue}")]
    SlideValidation {
        /// 1-based slide number.
        slide: usize,
        issue: crate::extract::SlideIssue,
    },

    /// Reading or writing persisted state failed.
    #[error("Persistence error ({path}): {reason}")]
    Persistence { path: PathBuf, reason: String },

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another run of the job holds the lock.
    #[error("Job is already running (lock held at {path}, pid {pid})")]
    AlreadyRunning { path: PathBuf, pid: String },

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Writing the destination workbook failed.
    #[error("Materialization error: {0}")]
    Materialize(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
