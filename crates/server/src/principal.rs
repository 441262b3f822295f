//! Caller identity from trusted gateway headers.
//!
//! The portal gateway authenticates the user and forwards identity as
//! `x-principal-id` plus `x-principal-scope`; this service never sees
//! credentials.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use immo_core::{Principal, Scope};

use crate::api::ErrorResponse;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_SCOPE_HEADER: &str = "x-principal-scope";

pub fn principal_from_headers(
    headers: &HeaderMap,
) -> Result<Principal, (StatusCode, Json<ErrorResponse>)> {
    let id = headers
        .get(PRINCIPAL_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("missing {} header", PRINCIPAL_ID_HEADER),
                }),
            )
        })?;

    let scope = match headers
        .get(PRINCIPAL_SCOPE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        None => Scope::Standard,
        Some(raw) => raw.parse().map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("invalid {} header: {}", PRINCIPAL_SCOPE_HEADER, raw),
                }),
            )
        })?,
    };

    Ok(Principal {
        id: id.to_string(),
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_defaults_to_standard_scope() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_ID_HEADER, HeaderValue::from_static("U1"));

        let principal = principal_from_headers(&headers).unwrap();
        assert_eq!(principal.id, "U1");
        assert_eq!(principal.scope, Scope::Standard);
    }

    #[test]
    fn test_admin_scope_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_ID_HEADER, HeaderValue::from_static("A1"));
        headers.insert(PRINCIPAL_SCOPE_HEADER, HeaderValue::from_static("admin"));

        let principal = principal_from_headers(&headers).unwrap();
        assert!(principal.is_admin());
    }

    #[test]
    fn test_missing_id_rejected() {
        let headers = HeaderMap::new();
        let err = principal_from_headers(&headers).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_ID_HEADER, HeaderValue::from_static("U1"));
        headers.insert(PRINCIPAL_SCOPE_HEADER, HeaderValue::from_static("root"));

        let err = principal_from_headers(&headers).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
