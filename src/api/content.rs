use super::{AppError, AppState};
use crate::content::{ContentRequest, GeneratedContent};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/:platform/:content_type", post(generate))
}

/// POST /api/:platform/:content_type
async fn generate(
    State(state): State<Arc<AppState>>,
    Path((platform, content_type)): Path<(String, String)>,
    Json(request): Json<ContentRequest>,
) -> Result<Json<GeneratedContent>, AppError> {
    let content = state
        .content
        .generate(&platform, &content_type, request)
        .await?;
    Ok(Json(content))
}
