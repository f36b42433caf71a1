//! Publishing and viewing shared documents

use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};
use forge_types::{PublishRequest, PublishResponse};
use tracing::info;

pub async fn publish(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    if request.code.trim().is_empty() {
        return Err(ApiError::bad_request("Code is required"));
    }

    let site = state
        .sites
        .publish(request.code, request.title, request.user_id);
    info!("Published \"{}\" as {}", site.title, site.id);

    Ok(Json(PublishResponse {
        success: true,
        url: format!(
            "{}/view/{}",
            state.public_base_url.trim_end_matches('/'),
            site.id
        ),
        id: site.id,
    }))
}

/// Serve a published document as-is
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    state
        .sites
        .view(&id)
        .map(|site| Html(site.code))
        .ok_or_else(|| ApiError::not_found("Site not found"))
}
