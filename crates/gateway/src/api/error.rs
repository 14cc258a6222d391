//! Uniform admin-handler error body: `{error: <code>, message?: <string>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub fn error_body(status: StatusCode, code: &str, message: Option<&str>) -> Response {
    let mut body = json!({ "error": code });
    if let Some(m) = message {
        body["message"] = Value::String(m.to_owned());
    }
    (status, Json(body)).into_response()
}

pub fn forbidden(code: &str) -> Response {
    error_body(StatusCode::FORBIDDEN, code, None)
}

pub fn bad_request(code: &str, message: &str) -> Response {
    error_body(StatusCode::BAD_REQUEST, code, Some(message))
}

pub fn not_found(code: &str) -> Response {
    error_body(StatusCode::NOT_FOUND, code, None)
}

pub fn conflict(code: &str) -> Response {
    error_body(StatusCode::CONFLICT, code, None)
}

pub fn service_unavailable(code: &str) -> Response {
    error_body(StatusCode::SERVICE_UNAVAILABLE, code, None)
}

pub fn internal_error(message: &str) -> Response {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", Some(message))
}
