use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Invalid report format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported coverage format (expected Clover XML or LCOV)")]
    UnsupportedFormat,

    #[error("Source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Source file is empty: {}", .0.display())]
    FileEmpty(PathBuf),

    #[error("Format error: {0}")]
    Format(String),

    #[error("A repository token or a service name is required to submit a job")]
    SubmissionPrecondition,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Upload to {uri} failed: {message}")]
    Upload { uri: String, message: String },
}

pub type Result<T> = std::result::Result<T, CovupError>;
