//! HTTP endpoint handlers. Each one follows the same shape: parse the JSON
//! body, run the validator, call one component, map the outcome into the
//! envelope.

pub mod database;
pub mod image;

use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;

/// Absent or malformed JSON bodies become an immediate validation error.
pub(crate) fn require_json_body(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Value, AppError> {
    match body {
        Ok(Json(v)) if v.is_object() => Ok(v),
        _ => Err(AppError::bad_body()),
    }
}
