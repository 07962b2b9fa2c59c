//! Router assembly: health, the /api/v1 surface, envelope fallbacks, and
//! the body-limit and CORS layers.

use crate::handlers;
use crate::response;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.version,
        "environment": state.config.environment,
        "features": state.config.features,
    }))
}

async fn not_found() -> impl IntoResponse {
    response::error(
        StatusCode::NOT_FOUND,
        "not_found",
        "resource not found".into(),
        None,
    )
}

/// axum answers wrong-method requests with a bare 405; wrap it in the
/// envelope like every other error.
async fn envelope_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return crate::response::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".into(),
            None,
        )
        .into_response();
    }
    response
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/image/generate", post(handlers::image::generate))
        .route("/image/models", get(handlers::image::models))
        .route("/database/execute", post(handlers::database::execute))
        .route(
            "/database/test-connection",
            post(handlers::database::test_connection),
        )
        .route(
            "/database/network-test",
            post(handlers::database::network_test),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(axum::middleware::map_response(envelope_method_not_allowed))
        .layer(RequestBodyLimitLayer::new(state.config.max_content_length))
        .layer(cors)
        .with_state(state)
}
