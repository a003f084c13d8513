// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("not a posture monitor export (type tag {found:?})")]
    WrongExportTag { found: Option<String> },

    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("feature vector has {found} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
