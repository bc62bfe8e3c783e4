//! # Dataset Store Errors

use thiserror::Error;

/// Result type for dataset store operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Dataset store errors
#[derive(Debug, Clone, Error)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(u64),

    #[error("Unsupported format: '{0}' (expected csv or json)")]
    UnsupportedFormat(String),

    /// Sample could not be parsed. Non-fatal for uploads.
    #[error("Schema inference failed: {0}")]
    Ingest(String),

    #[error("Dataset index is corrupt: {0}")]
    CorruptIndex(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DatasetError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            DatasetError::NotFound(_) => 404,
            DatasetError::UnsupportedFormat(_) => 400,
            DatasetError::Ingest(_) => 422,
            DatasetError::CorruptIndex(_) => 500,
            DatasetError::IoError(_) => 500,
        }
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        DatasetError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DatasetError::NotFound(7).status_code(), 404);
        assert_eq!(DatasetError::UnsupportedFormat("xlsx".into()).status_code(), 400);
        assert_eq!(DatasetError::IoError("disk".into()).status_code(), 500);
    }
}
