//! HTTP response building helpers
//!
//! Provides a consistent API for building HTTP responses across all handlers.
//! Every error body is `{"error": "<message>"}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::ServiceError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

fn error_body(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::BAD_REQUEST, message)
}

pub fn unauthorized(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::UNAUTHORIZED, message)
}

pub fn forbidden(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::FORBIDDEN, message)
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub fn conflict(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::CONFLICT, message)
}

pub fn internal_error(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// Convert a ServiceError to an appropriate HTTP response
pub fn error_response(err: ServiceError) -> Response<Full<Bytes>> {
    match &err {
        ServiceError::NotFound(msg) => not_found(msg),
        ServiceError::Forbidden(msg) => forbidden(msg),
        ServiceError::InvalidInput(msg) => bad_request(msg),
        ServiceError::Json(e) => bad_request(&format!("JSON error: {}", e)),
        ServiceError::Conflict(msg) => conflict(msg),
        ServiceError::Auth(msg) => unauthorized(msg),
        _ => {
            error!(error = %err, "Request failed");
            internal_error(&err.to_string())
        }
    }
}

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = ok(&serde_json::json!({"test": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_error_response_mapping() {
        let cases = [
            (ServiceError::NotFound("cell".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("empty".into()), StatusCode::CONFLICT),
            (ServiceError::Auth("who".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::FatalConfiguration("rank".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(error_response(err).status(), status);
        }
    }
}
