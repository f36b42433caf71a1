//! Chat handler: one generation cycle per request

use crate::error::ApiError;
use crate::storage::memory::ANONYMOUS_USER;
use crate::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use forge_core::GenerationPipeline;
use forge_types::{ChatRequest, ChatResponse};
use tracing::info;

pub const USER_ID_HEADER: &str = "X-User-Id";

fn extract_user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string())
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let user_id = extract_user_id(&headers);
    info!(
        "Chat request from {} ({} history turns)",
        user_id,
        request.history.len()
    );

    let mut pipeline = GenerationPipeline::new(state.generator.clone(), state.quotas.gate_for(&user_id));
    if let Some(checker) = &state.images {
        pipeline = pipeline.with_image_checker(checker.clone());
    }

    let response = pipeline.run(&request).await?;
    Ok(Json(response))
}
