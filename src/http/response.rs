//! Response handling for gateway-originated responses.
//!
//! # Responsibilities
//! - Build the uniform `{"error": "<code>"}` JSON body
//! - Stamp the request ID and security headers on every response
//!
//! # Design Decisions
//! - Bodies produced here carry only a reason code, never internal detail
//! - Relayed origin bodies are streamed untouched; only headers change

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::security::headers;

/// JSON error response with a stable reason code.
pub fn json_error(status: StatusCode, reason: &'static str) -> Response {
    (status, Json(json!({ "error": reason }))).into_response()
}

/// Final header pass applied to every response leaving the gateway.
pub fn finalize(response: &mut Response, request_id: &str, security_headers: bool) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    if security_headers {
        headers::apply_security_headers(response.headers_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_error_body() {
        let response = json_error(StatusCode::NOT_FOUND, "not_found");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"not_found"}"#);
    }

    #[test]
    fn test_finalize_sets_request_id_and_security_headers() {
        let mut response = json_error(StatusCode::OK, "x");
        finalize(&mut response, "rid-9", true);
        assert_eq!(response.headers()["x-request-id"], "rid-9");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let mut bare = json_error(StatusCode::OK, "x");
        finalize(&mut bare, "rid-9", false);
        assert!(bare.headers().get("x-content-type-options").is_none());
    }
}
