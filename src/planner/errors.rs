//! Compile error types
//!
//! Error codes:
//! - QUERY_UNKNOWN_COLUMN (REJECT)
//! - QUERY_UNSUPPORTED_AGGREGATE (REJECT)
//! - QUERY_UNGROUPED_COLUMN (REJECT)
//! - QUERY_UNSUPPORTED_OPERATOR (REJECT)
//! - QUERY_INVALID (REJECT)

use std::fmt;

/// Severity levels for compile errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Compile error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorCode {
    /// Column absent from the dataset schema
    QueryUnknownColumn,
    /// Aggregate function outside sum/avg/count/min/max
    QueryUnsupportedAggregate,
    /// Plain column mixed with aggregates but not grouped
    QueryUngroupedColumn,
    /// Filter operator outside the supported set
    QueryUnsupportedOperator,
    /// Any other malformed specification
    QueryInvalid,
}

impl CompileErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorCode::QueryUnknownColumn => "QUERY_UNKNOWN_COLUMN",
            CompileErrorCode::QueryUnsupportedAggregate => "QUERY_UNSUPPORTED_AGGREGATE",
            CompileErrorCode::QueryUngroupedColumn => "QUERY_UNGROUPED_COLUMN",
            CompileErrorCode::QueryUnsupportedOperator => "QUERY_UNSUPPORTED_OPERATOR",
            CompileErrorCode::QueryInvalid => "QUERY_INVALID",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Compile error with code, reason and offending field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    code: CompileErrorCode,
    message: String,
    field: Option<String>,
}

impl CompileError {
    pub fn unknown_column(column: impl Into<String>) -> Self {
        let c = column.into();
        Self {
            code: CompileErrorCode::QueryUnknownColumn,
            message: format!("Column '{}' does not exist in dataset", c),
            field: Some(c),
        }
    }

    pub fn unsupported_aggregate(func: impl Into<String>) -> Self {
        let f = func.into();
        Self {
            code: CompileErrorCode::QueryUnsupportedAggregate,
            message: format!(
                "Aggregate '{}' is not supported (expected sum, avg, count, min or max)",
                f
            ),
            field: Some(f),
        }
    }

    pub fn ungrouped_column(column: impl Into<String>) -> Self {
        let c = column.into();
        Self {
            code: CompileErrorCode::QueryUngroupedColumn,
            message: format!(
                "Column '{}' must appear in group_by when aggregating",
                c
            ),
            field: Some(c),
        }
    }

    pub fn unsupported_operator(op: impl Into<String>) -> Self {
        let o = op.into();
        Self {
            code: CompileErrorCode::QueryUnsupportedOperator,
            message: format!("Operator '{}' is not supported", o),
            field: Some(o),
        }
    }

    /// Create a generic invalid-query error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            code: CompileErrorCode::QueryInvalid,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an invalid-query error tied to a column
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: CompileErrorCode::QueryInvalid,
            message: reason.into(),
            field: Some(field.into()),
        }
    }

    pub fn code(&self) -> CompileErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// Result type for compile operations
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CompileErrorCode::QueryUnknownColumn.code(),
            "QUERY_UNKNOWN_COLUMN"
        );
        assert_eq!(
            CompileErrorCode::QueryUngroupedColumn.code(),
            "QUERY_UNGROUPED_COLUMN"
        );
        assert_eq!(CompileErrorCode::QueryInvalid.code(), "QUERY_INVALID");
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::unknown_column("salez");
        let display = format!("{}", err);
        assert!(display.contains("REJECT"));
        assert!(display.contains("QUERY_UNKNOWN_COLUMN"));
        assert!(display.contains("salez"));
        assert_eq!(err.field(), Some("salez"));
    }
}
