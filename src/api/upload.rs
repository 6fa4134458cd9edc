use super::{AppError, AppState};
use crate::error::Error;
use crate::oauth::FlowPurpose;
use crate::upload::{parse_tags, UploadRequest, UploadScratch};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Headroom for the text fields and multipart framing around the video
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    video_id: String,
    response: Value,
}

/// Failure while reading the form
enum FormError {
    Multipart(MultipartError),
    Staging(Error),
}

impl From<MultipartError> for FormError {
    fn from(e: MultipartError) -> Self {
        FormError::Multipart(e)
    }
}

impl From<Error> for FormError {
    fn from(e: Error) -> Self {
        FormError::Staging(e)
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        match self {
            FormError::Multipart(e) => {
                warn!(error = %e, "Rejected upload form");
                let status = e.status();
                (status, Json(serde_json::json!({ "error": e.body_text() }))).into_response()
            }
            FormError::Staging(e) => AppError::from(e).into_response(),
        }
    }
}

pub(super) fn router(max_video_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/upload_video", post(upload_video))
        .layer(DefaultBodyLimit::max(
            max_video_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
}

/// Read the form, streaming `video_file` into `scratch` chunk by chunk.
async fn read_form(
    mut multipart: Multipart,
    scratch: &UploadScratch,
) -> Result<UploadRequest, FormError> {
    let mut request = UploadRequest::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(String::from);

                let mut writer = scratch.create_video(&filename, content_type).await?;
                while let Some(chunk) = field.chunk().await? {
                    writer.write(&chunk).await?;
                }
                let video = writer.finish().await?;

                debug!(filename = %video.filename, bytes = video.size, "Received video file");
                request.video = Some(video);
            }
            "video_id" => request.video_id = field.text().await?,
            "title" => request.title = field.text().await?,
            "description" => request.description = field.text().await?,
            "tags" => request.tags = parse_tags(&field.text().await?),
            "category_id" => request.category_id = Some(field.text().await?),
            "publish_time" => request.publish_time = field.text().await?,
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(request)
}

/// POST /api/upload_video
///
/// Multipart fields: `video_file`, `video_id`, `title`, `description`,
/// `tags` (comma-separated), `category_id` (default "24"), `publish_time`.
async fn upload_video(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let scratch = match state.uploader.scratch() {
        Ok(scratch) => scratch,
        Err(e) => return AppError::from(e).into_response(),
    };

    let request = match read_form(multipart, &scratch).await {
        Ok(request) => request,
        Err(e) => {
            scratch.close();
            return e.into_response();
        }
    };

    debug!(video_id = %request.video_id, title = %request.title, "Upload requested");

    match state
        .uploader
        .upload(scratch, request, state.oauth.client(FlowPurpose::Upload))
        .await
    {
        Ok(outcome) => Json(UploadResponse {
            message: "Upload Complete!",
            video_id: outcome.video_id,
            response: outcome.response,
        })
        .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
