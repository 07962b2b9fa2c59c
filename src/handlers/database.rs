//! Database endpoints: ad hoc SQL execution, driver connection test, and a
//! raw TCP reachability probe.

use super::require_json_body;
use crate::db::executor::truncate_sql;
use crate::db::{ConnectionInfo, NetworkProbe};
use crate::error::AppError;
use crate::response;
use crate::state::AppState;
use crate::validate::{namespace_errors, FieldErrors, RequestValidator};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

const CONNECTION_KEYS: [&str; 6] = ["host", "port", "user", "password", "database", "charset"];
const REQUIRED_CONNECTION_KEYS: [&str; 4] = ["host", "user", "password", "database"];

/// The execute endpoint accepts two request dialects: a nested `connection`
/// object, and connection fields flattened to the top level. Both are
/// normalized to the nested shape before validation so they resolve to the
/// identical `ConnectionInfo`.
pub(crate) fn normalize_execute_body(mut body: Value) -> Value {
    let Some(map) = body.as_object_mut() else {
        return body;
    };
    if !map.contains_key("connection") && map.contains_key("host") {
        let mut connection = Map::new();
        for key in CONNECTION_KEYS {
            if let Some(v) = map.remove(key) {
                connection.insert(key.to_string(), v);
            }
        }
        map.insert("connection".to_string(), Value::Object(connection));
    }
    body
}

/// Field-level validation of the connection block, errors namespaced as
/// `connection.<field>`.
fn validate_connection(connection: &Value) -> Result<ConnectionInfo, FieldErrors> {
    let mut v = RequestValidator::new(connection);
    v.string("host", 1, None, None);
    v.string("user", 1, None, None);
    v.string("password", 0, None, None);
    v.string("database", 1, None, None);
    if connection.get("port").is_some() {
        v.integer("port", Some(1), Some(65535));
    }
    if connection.get("charset").is_some() {
        v.string("charset", 1, None, None);
    }
    let validated = v.finish().map_err(|e| namespace_errors("connection", e))?;
    serde_json::from_value(Value::Object(validated)).map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.insert("connection".to_string(), format!("invalid connection info: {}", e));
        errors
    })
}

/// POST /api/v1/database/execute
pub async fn execute(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let data = normalize_execute_body(require_json_body(body)?);

    let mut v = RequestValidator::new(&data);
    v.required("sql");
    v.string("sql", 1, Some(10000), None);
    v.required("connection");
    v.object("connection", &REQUIRED_CONNECTION_KEYS);
    let validated = v.finish().map_err(AppError::Validation)?;

    let connection = validate_connection(&validated["connection"]).map_err(AppError::Validation)?;
    let sql = validated["sql"].as_str().unwrap_or_default().to_string();
    // Lenient like the source: a non-integer timeout falls back to the default.
    let timeout = data
        .get("timeout")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| state.executor.default_timeout());

    tracing::info!(sql = %truncate_sql(&sql), host = %connection.host, "sql execution request");
    let outcome = state.executor.execute(&sql, &connection, timeout).await?;
    Ok(response::success(
        "sql executed",
        json!({
            "data": outcome.data,
            "execution_time": outcome.execution_time,
            "row_count": outcome.row_count,
            "sql": sql,
        }),
    ))
}

/// POST /api/v1/database/test-connection
pub async fn test_connection(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let data = require_json_body(body)?;

    let mut v = RequestValidator::new(&data);
    v.required("connection");
    v.object("connection", &REQUIRED_CONNECTION_KEYS);
    let validated = v.finish().map_err(AppError::Validation)?;

    let connection = validate_connection(&validated["connection"]).map_err(AppError::Validation)?;
    tracing::info!(host = %connection.host, "connection test request");
    let outcome = state.tester.test(&connection).await?;
    Ok(response::success(
        "connection test succeeded",
        json!({
            "connected": true,
            "server_version": outcome.server_version,
            "response_time": outcome.response_time,
        }),
    ))
}

/// POST /api/v1/database/network-test
pub async fn network_test(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let data = require_json_body(body)?;

    let mut v = RequestValidator::new(&data);
    v.required("host");
    v.string("host", 1, None, None);
    if data.get("port").is_some() {
        v.integer("port", Some(1), Some(65535));
    }
    let validated = v.finish().map_err(AppError::Validation)?;

    let host = validated["host"].as_str().unwrap_or_default().to_string();
    let port = validated
        .get("port")
        .and_then(Value::as_u64)
        .map(|p| p as u16)
        .unwrap_or(state.config.mysql.port);

    let response_time = NetworkProbe::probe(&host, port).await?;
    Ok(response::success(
        "tcp connect succeeded",
        json!({
            "tcp_connected": true,
            "response_time": response_time,
            "host": host,
            "port": port,
        }),
    ))
}
