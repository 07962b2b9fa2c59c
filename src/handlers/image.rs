//! Image endpoints: generation and the static model listing.

use super::require_json_body;
use crate::error::AppError;
use crate::response;
use crate::state::AppState;
use crate::validate::RequestValidator;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

/// POST /api/v1/image/generate
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let data = require_json_body(body)?;

    let mut v = RequestValidator::new(&data);
    v.required("reference_url");
    v.url("reference_url");
    v.required("prompt");
    v.string("prompt", 1, Some(1000), None);
    let validated = v.finish().map_err(AppError::Validation)?;

    let reference_url = validated["reference_url"].as_str().unwrap_or_default().to_string();
    let prompt = validated["prompt"].as_str().unwrap_or_default().to_string();
    let model = data.get("model").and_then(Value::as_str).map(str::to_string);

    tracing::info!(%reference_url, %prompt, model = model.as_deref().unwrap_or("<default>"), "image generation request");
    let outcome = state
        .generator
        .generate(&reference_url, &prompt, model.as_deref())
        .await?;
    Ok(response::success(
        "image generated",
        json!({
            "image_url": outcome.image_url,
            "model": outcome.model,
            "prompt": prompt,
            "reference_url": reference_url,
        }),
    ))
}

/// GET /api/v1/image/models
pub async fn models(State(state): State<AppState>) -> impl IntoResponse {
    response::success("model list", state.generator.available_models())
}
