//! Handler-level error type and its HTTP mapping.
//!
//! Component failures are structured values; `From` impls attach the
//! classification, status, and operational details here so handlers can use
//! `?`. Unexpected failures collapse to a generic internal error that leaks
//! no driver or credential detail.

use crate::db::{ExecuteError, NetworkError, TestError};
use crate::image::GenerateError;
use crate::response;
use crate::validate::FieldErrors;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("request validation failed")]
    Validation(FieldErrors),
    #[error("{message}")]
    Classified {
        status: StatusCode,
        error_type: &'static str,
        message: String,
        details: Option<Value>,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Missing or malformed request body.
    pub fn bad_body() -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(
            "request".to_string(),
            "request body must be a JSON object".to_string(),
        );
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => response::validation_error(&errors).into_response(),
            AppError::Classified {
                status,
                error_type,
                message,
                details,
            } => response::error(status, error_type, message, details).into_response(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "unhandled internal error");
                response::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".into(),
                    None,
                )
                .into_response()
            }
        }
    }
}

impl From<ExecuteError> for AppError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Database {
                code,
                message,
                sql,
                execution_time,
            } => AppError::Classified {
                status: StatusCode::BAD_REQUEST,
                error_type: "database_error",
                message: format!("database operation failed: {}", message),
                details: Some(json!({
                    "error_code": code,
                    "execution_time": execution_time,
                    "sql": sql,
                })),
            },
            ExecuteError::Execution {
                message,
                execution_time,
            } => AppError::Classified {
                status: StatusCode::BAD_REQUEST,
                error_type: "execution_error",
                message: format!("sql execution failed: {}", message),
                details: Some(json!({
                    "execution_time": execution_time,
                    "error": message,
                })),
            },
        }
    }
}

impl From<TestError> for AppError {
    fn from(err: TestError) -> Self {
        match err {
            TestError::Connection {
                message,
                response_time,
            } => AppError::Classified {
                status: StatusCode::BAD_REQUEST,
                error_type: "connection_error",
                message: format!("database connection failed: {}", message),
                details: Some(json!({
                    "response_time": response_time,
                    "error": message,
                })),
            },
            TestError::Other {
                message,
                response_time,
            } => AppError::Classified {
                status: StatusCode::BAD_REQUEST,
                error_type: "test_error",
                message: format!("connection test failed: {}", message),
                details: Some(json!({
                    "response_time": response_time,
                    "error": message,
                })),
            },
        }
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        AppError::Classified {
            status: StatusCode::BAD_REQUEST,
            error_type: "network_error",
            message: format!("tcp connect failed: {}", err.message),
            details: Some(json!({
                "host": err.host,
                "port": err.port,
                "response_time": err.response_time,
                "error": err.message,
            })),
        }
    }
}

impl From<GenerateError> for AppError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::RateLimitExceeded {
                attempts,
                last_error,
            } => AppError::Classified {
                status: StatusCode::TOO_MANY_REQUESTS,
                error_type: "rate_limit_exceeded",
                message: "api rate limit exceeded, retry later".into(),
                details: Some(json!({
                    "attempts": attempts,
                    "last_error": last_error,
                })),
            },
            GenerateError::Failed {
                attempts,
                last_error,
                execution_time,
            } => AppError::Classified {
                status: StatusCode::BAD_GATEWAY,
                error_type: "generation_failed",
                message: "image generation failed".into(),
                details: Some(json!({
                    "attempts": attempts,
                    "execution_time": execution_time,
                    "last_error": last_error,
                })),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_429() {
        let err: AppError = GenerateError::RateLimitExceeded {
            attempts: 3,
            last_error: "429".into(),
        }
        .into();
        match err {
            AppError::Classified {
                status, error_type, ..
            } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(error_type, "rate_limit_exceeded");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn database_error_detail_keeps_sql_excerpt() {
        let err: AppError = ExecuteError::Database {
            code: Some(1045),
            message: "access denied".into(),
            sql: "SELECT 1".into(),
            execution_time: 0.2,
        }
        .into();
        match err {
            AppError::Classified {
                error_type, details, ..
            } => {
                assert_eq!(error_type, "database_error");
                let details = details.unwrap();
                assert_eq!(details["error_code"], 1045);
                assert_eq!(details["sql"], "SELECT 1");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
