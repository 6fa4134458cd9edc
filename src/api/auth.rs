//! Login and upload-authorization routes.
//!
//! Both flows share one shape: the start route issues a state, stores it in
//! the caller's session and sends the user-agent to the provider; the
//! callback takes that state back out of the session (so it can only be
//! redeemed once) and completes the exchange.

use super::{AppError, AppState};
use crate::error::{Error, Result};
use crate::oauth::FlowPurpose;
use crate::session::SessionUser;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub(super) struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
struct AuthUrlResponse {
    auth_url: String,
}

#[derive(Serialize)]
struct MeResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_time: Option<String>,
}

#[derive(Serialize)]
struct UploadAuthStatus {
    authenticated: bool,
}

pub(super) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/oauth2callback", get(login_callback))
        .route("/logout", get(logout))
        .route("/api/authenticate_youtube", post(authenticate_youtube))
        .route("/youtube_auth_callback", get(youtube_auth_callback))
        .route("/api/me", get(me))
        .route("/api/youtube_status", get(youtube_status))
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// Start a flow for `purpose` and bind its state to the caller's session.
///
/// Returns the authorization URL and the cookie to set, if the session is new.
fn begin(state: &AppState, headers: &HeaderMap, purpose: FlowPurpose) -> (String, Option<HeaderValue>) {
    let (session_id, created) = state.sessions.resolve(headers);
    let (auth_url, oauth_state) = state.oauth.start_flow(purpose);
    state.sessions.put_state(&session_id, purpose, &oauth_state);

    let cookie = created.then(|| state.sessions.cookie(&session_id));
    (auth_url, cookie)
}

/// Consume the pending state for `purpose` and complete the exchange.
///
/// The pending state is removed before anything else is checked, so a
/// failed callback also ends the flow.
async fn finish(
    state: &AppState,
    headers: &HeaderMap,
    purpose: FlowPurpose,
    callback: OAuthCallback,
) -> Result<(Option<String>, crate::credentials::Credential)> {
    let session_id = state.sessions.session_id(headers);
    let expected = session_id
        .as_deref()
        .and_then(|id| state.sessions.take_state(id, purpose));

    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(%purpose, error = %error, description = %description, "Provider returned an authorization error");
        return Err(Error::Validation(format!(
            "Authorization failed: {} - {}",
            error, description
        )));
    }

    let received = callback
        .state
        .ok_or_else(|| Error::validation("Missing 'state' parameter"))?;
    let code = callback.code.unwrap_or_default();

    let credential = state
        .oauth
        .complete_flow(purpose, &code, &received, expected.as_deref())
        .await?;

    Ok((session_id, credential))
}

/// POST /login
///
/// Redirects to the provider's consent page for the login identity.
async fn login(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (auth_url, cookie) = begin(&state, &headers, FlowPurpose::Login);
    with_cookie(Redirect::to(&auth_url).into_response(), cookie)
}

/// GET /oauth2callback
///
/// Completes the login flow, records the user and signs in under a fresh
/// session id.
async fn login_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(callback): Query<OAuthCallback>,
) -> Result<Response, AppError> {
    let (session_id, credential) = finish(&state, &headers, FlowPurpose::Login, callback).await?;

    let identity = state.oauth.fetch_identity(&credential).await?;
    let user_id = state.users.upsert(&identity)?;

    let session_id = state.sessions.sign_in(
        session_id.as_deref(),
        SessionUser {
            user_id: user_id.clone(),
            email: identity.email.clone(),
        },
    );

    info!(user_id = %user_id, "User signed in");
    Ok(with_cookie(
        Redirect::to(&state.server.home_path).into_response(),
        Some(state.sessions.cookie(&session_id)),
    ))
}

/// GET /logout
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(session_id) = state.sessions.session_id(&headers) {
        state.sessions.remove(&session_id);
        info!("User signed out");
    }

    with_cookie(
        Redirect::to(&state.server.home_path).into_response(),
        Some(state.sessions.expired_cookie()),
    )
}

/// POST /api/authenticate_youtube
///
/// Returns the consent URL for the upload identity; the front end navigates
/// to it.
async fn authenticate_youtube(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (auth_url, cookie) = begin(&state, &headers, FlowPurpose::Upload);
    with_cookie(Json(AuthUrlResponse { auth_url }).into_response(), cookie)
}

/// GET /youtube_auth_callback
///
/// Completes the upload flow and persists the credential, then sends the
/// user back to the services page with `youtube_auth=success|error`.
async fn youtube_auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(callback): Query<OAuthCallback>,
) -> Response {
    let result = async {
        let (_, credential) = finish(&state, &headers, FlowPurpose::Upload, callback).await?;
        state.uploader.credentials().save(&credential)
    }
    .await;

    let target = match result {
        Ok(()) => {
            info!("Upload identity authorized");
            format!("{}?youtube_auth=success", state.server.services_path)
        }
        Err(e) => {
            warn!(error = %e, "Upload authorization failed");
            format!(
                "{}?youtube_auth=error&message={}",
                state.server.services_path,
                urlencoding::encode(&e.to_string())
            )
        }
    };

    Redirect::to(&target).into_response()
}

/// GET /api/me
async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<MeResponse> {
    let user = state
        .sessions
        .session_id(&headers)
        .and_then(|id| state.sessions.user(&id));

    Json(match user {
        Some(user) => {
            // The registry rotates daily, so the record may be gone
            let login_time = match state.users.get(&user.user_id) {
                Ok(record) => record.map(|r| r.login_time),
                Err(e) => {
                    warn!(error = %e, "Failed to read user registry");
                    None
                }
            };
            MeResponse {
                authenticated: true,
                user_id: Some(user.user_id),
                email: Some(user.email),
                login_time,
            }
        }
        None => MeResponse {
            authenticated: false,
            user_id: None,
            email: None,
            login_time: None,
        },
    })
}

/// GET /api/youtube_status
async fn youtube_status(State(state): State<Arc<AppState>>) -> Json<UploadAuthStatus> {
    Json(UploadAuthStatus {
        authenticated: state.uploader.credentials().exists(),
    })
}
