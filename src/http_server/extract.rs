//! Request helpers shared by the route modules

use axum::{body::Bytes, http::HeaderMap};
use serde::de::DeserializeOwned;

use super::errors::{ApiError, ApiResult};
use crate::engine::{Caller, Role};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller role; absent means viewer
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Reads the caller identity set by the upstream gateway.
pub fn caller_from_headers(headers: &HeaderMap) -> ApiResult<Caller> {
    let user_id = match header_value(headers, USER_ID_HEADER)? {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Ok(Caller::anonymous()),
    };
    let role = match header_value(headers, USER_ROLE_HEADER)? {
        Some(role) if !role.is_empty() => role.parse::<Role>().map_err(ApiError::bad_request)?,
        _ => Role::Viewer,
    };

    Ok(Caller::new(user_id, role))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(str::trim)
                .map_err(|_| ApiError::bad_request(format!("{} is not valid text", name)))
        })
        .transpose()
}

/// Decodes a JSON body, reporting failures in the standard error shape.
pub fn decode_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_missing_headers_are_anonymous_viewer() {
        let caller = caller_from_headers(&HeaderMap::new()).unwrap();
        assert_eq!(caller.role, Role::Viewer);
        assert_eq!(caller.user_id, "anonymous");
    }

    #[test]
    fn test_role_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Editor"));

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller, Caller::new("u-1", Role::Editor));
    }

    #[test]
    fn test_missing_role_is_viewer() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        assert_eq!(caller_from_headers(&headers).unwrap().role, Role::Viewer);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("root"));
        assert!(caller_from_headers(&headers).is_err());
    }
}
