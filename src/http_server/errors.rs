//! HTTP error responses
//!
//! Every failed request returns `{error, code, status, field?}` with the
//! matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Error body returned by every route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A failed request
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                code: code.into(),
                status: status.as_u16(),
                field: None,
            },
        }
    }

    /// Malformed request body or headers
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorResponse {
        &self.body
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut api = Self::new(status, err.code(), err.public_message());
        api.body.field = err.field().map(str::to_string);
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Result type for route handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CompileError;

    #[test]
    fn test_engine_error_mapping() {
        let err: ApiError = EngineError::from(CompileError::ungrouped_column("region")).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().code, "QUERY_UNGROUPED_COLUMN");
        assert_eq!(err.body().field.as_deref(), Some("region"));

        let err: ApiError = EngineError::Timeout("slow".into()).into();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.body().status, 504);
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err: ApiError = EngineError::Internal("/var/lib/aeroquery: EACCES".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().error, "Internal error");
    }

    #[test]
    fn test_field_omitted_when_absent() {
        let json = serde_json::to_value(ApiError::bad_request("nope").body()).unwrap();
        assert!(json.get("field").is_none());
        assert_eq!(json["code"], "INVALID_REQUEST");
    }
}
