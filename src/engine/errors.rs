//! # Engine Errors
//!
//! Public error taxonomy of the query engine. Module-level errors convert
//! in through `From`; the HTTP and CLI boundaries map these to status codes
//! and stable string codes.

use thiserror::Error;
use tracing::error;

use crate::dataset::DatasetError;
use crate::executor::ExecutorError;
use crate::planner::CompileError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Message returned to callers for internal failures
const INTERNAL_MESSAGE: &str = "Internal error";

/// Engine errors
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Dataset not found: {0}")]
    NotFound(u64),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Ingest(String),

    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Forbidden(String),

    /// Detail is logged, never returned
    #[error("Internal error")]
    Internal(String),
}

impl EngineError {
    /// Wraps an unexpected failure and logs its detail.
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        error!(error = %detail, "internal engine error");
        EngineError::Internal(detail)
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "DATASET_NOT_FOUND",
            EngineError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            EngineError::Ingest(_) => "INGEST_FAILED",
            EngineError::Validation { code, .. } => *code,
            EngineError::Execution(_) => "EXECUTION_FAILED",
            EngineError::Timeout(_) => "EXECUTION_TIMEOUT",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::UnsupportedFormat(_) => 400,
            EngineError::Ingest(_) => 422,
            EngineError::Validation { .. } => 400,
            EngineError::Execution(_) => 400,
            EngineError::Timeout(_) => 504,
            EngineError::Forbidden(_) => 403,
            EngineError::Internal(_) => 500,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            EngineError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Offending field for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            EngineError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::UnsupportedFormat(_)
                | EngineError::Validation { .. }
                | EngineError::Forbidden(_)
        )
    }
}

impl From<DatasetError> for EngineError {
    fn from(err: DatasetError) -> Self {
        match &err {
            DatasetError::NotFound(id) => EngineError::NotFound(*id),
            DatasetError::UnsupportedFormat(_) => EngineError::UnsupportedFormat(err.to_string()),
            DatasetError::Ingest(_) => EngineError::Ingest(err.to_string()),
            DatasetError::CorruptIndex(_) | DatasetError::IoError(_) => {
                EngineError::internal(err.to_string())
            }
        }
    }
}

impl From<CompileError> for EngineError {
    fn from(err: CompileError) -> Self {
        EngineError::Validation {
            code: err.code().code(),
            message: err.message().to_string(),
            field: err.field().map(str::to_string),
        }
    }
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        if err.is_timeout() {
            EngineError::Timeout(err.message().to_string())
        } else {
            EngineError::Execution(err.message().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EngineError::NotFound(1).status_code(), 404);
        assert_eq!(EngineError::UnsupportedFormat("x".into()).status_code(), 400);
        assert_eq!(EngineError::Ingest("x".into()).status_code(), 422);
        assert_eq!(EngineError::Execution("x".into()).status_code(), 400);
        assert_eq!(EngineError::Timeout("x".into()).status_code(), 504);
        assert_eq!(EngineError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(EngineError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_compile_error_keeps_code_and_field() {
        let err: EngineError = CompileError::unknown_column("ghost").into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "QUERY_UNKNOWN_COLUMN");
        assert_eq!(err.field(), Some("ghost"));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_executor_timeout_maps_to_504() {
        let err: EngineError = ExecutorError::timeout(Duration::from_millis(5)).into();
        assert_eq!(err.status_code(), 504);
        assert_eq!(err.code(), "EXECUTION_TIMEOUT");

        let err: EngineError = ExecutorError::execution_failed("bad").into();
        assert_eq!(err.code(), "EXECUTION_FAILED");
    }

    #[test]
    fn test_dataset_errors() {
        let err: EngineError = DatasetError::NotFound(9).into();
        assert_eq!(err.status_code(), 404);

        let err: EngineError = DatasetError::UnsupportedFormat("xlsx".into()).into();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");

        let err: EngineError = DatasetError::IoError("/srv/data/secret: denied".into()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal error");
        assert!(!err.public_message().contains("/srv"));
    }
}
