//! Uniform response envelope shared by every endpoint.
//!
//! Success bodies never carry `error_type`/`details`; error bodies always
//! serialize `result` as null. The HTTP status code is not repeated in the
//! body.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn success(message: &str, result: Value) -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            message: message.to_string(),
            result,
            error_type: None,
            details: None,
        }),
    )
}

pub fn error(
    status: StatusCode,
    error_type: &str,
    message: String,
    details: Option<Value>,
) -> (StatusCode, Json<Envelope>) {
    (
        status,
        Json(Envelope {
            success: false,
            message,
            result: Value::Null,
            error_type: Some(error_type.to_string()),
            details,
        }),
    )
}

/// 400 with the full per-field error map under `details`.
pub fn validation_error(errors: &BTreeMap<String, String>) -> (StatusCode, Json<Envelope>) {
    error(
        StatusCode::BAD_REQUEST,
        "validation_error",
        "request validation failed".into(),
        Some(serde_json::to_value(errors).unwrap_or(Value::Null)),
    )
}
