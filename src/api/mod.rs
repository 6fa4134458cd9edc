//! HTTP surface.
//!
//! Routes:
//! - `POST /login`, `GET /oauth2callback`, `GET /logout` (login identity)
//! - `POST /api/authenticate_youtube`, `GET /youtube_auth_callback` (upload
//!   identity)
//! - `POST /api/upload_video` (multipart)
//! - `POST /api/:platform/:content_type` (content generation)
//! - `GET /api/me`, `GET /api/youtube_status`, `GET /health`

mod auth;
mod content;
mod upload;

use crate::config::ServerConfig;
use crate::content::ContentService;
use crate::error::Error;
use crate::oauth::OAuthManager;
use crate::session::SessionStore;
use crate::upload::VideoUploader;
use crate::users::UserStore;
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Where the front end re-enters the upload authorization flow
pub const UPLOAD_AUTH_PATH: &str = "/api/authenticate_youtube";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub server: ServerConfig,
    pub sessions: SessionStore,
    pub oauth: Arc<OAuthManager>,
    pub users: Arc<UserStore>,
    pub uploader: Arc<VideoUploader>,
    pub content: Arc<ContentService>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_url: Option<&'static str>,
}

/// HTTP mapping of `Error`
pub(crate) struct AppError(Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;

        if err.requires_auth() {
            let body = ErrorResponse {
                error: err.to_string(),
                auth_required: Some(true),
                auth_url: Some(UPLOAD_AUTH_PATH),
            };
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }

        let (status, message) = match &err {
            Error::Validation(_) | Error::StateMismatch | Error::MissingState => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Error::TokenExchange(_) | Error::ContentGeneration(_) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            Error::Upload(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Upload failed: {}", msg),
            ),
            _ => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = ErrorResponse {
            error: message,
            auth_required: None,
            auth_url: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let max_video_bytes = state.uploader.config().max_video_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .merge(auth::router())
        .merge(upload::router(max_video_bytes))
        .merge(content::router())
        .route("/health", get(health))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
