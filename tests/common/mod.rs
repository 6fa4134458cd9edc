// Shared harness for the HTTP integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Response, Router};
use socialkit::api::{create_router, AppState};
use socialkit::config::{AppConfig, OAuthClientSection, UploadConfig};
use socialkit::content::{ContentService, TextGenerator};
use socialkit::credentials::{Credential, CredentialStore};
use socialkit::oauth::OAuthManager;
use socialkit::session::SessionStore;
use socialkit::upload::VideoUploader;
use socialkit::users::UserStore;
use socialkit::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub const COOKIE_NAME: &str = "socialkit_session";

/// Generator that always returns the same text, or always fails
pub struct CannedGenerator(pub Option<String>);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| Error::ContentGeneration("AI service error".to_string()))
    }
}

pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub router: Router,
}

impl TestApp {
    pub fn credentials_file(&self) -> PathBuf {
        self.dir.path().join("youtube_credentials.json")
    }

    pub fn users_file(&self) -> PathBuf {
        self.dir.path().join("user_data.json")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Store a valid upload credential, as a completed upload flow would.
    pub fn authorize_upload(&self) {
        CredentialStore::new(self.credentials_file(), None)
            .unwrap()
            .save(&Credential {
                access_token: "ya29.upload".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                scopes: ["https://www.googleapis.com/auth/youtube.upload".to_string()].into(),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
            .unwrap();
    }
}

fn client_section(provider_url: &str, id: &str) -> OAuthClientSection {
    OAuthClientSection {
        client_id: Some(id.to_string()),
        client_secret: Some(format!("{}-secret", id)),
        auth_uri: Some(format!("{}/auth", provider_url)),
        token_uri: Some(format!("{}/token", provider_url)),
        ..OAuthClientSection::default()
    }
}

/// Build the full router against a mock provider at `provider_url`.
pub fn test_app(provider_url: &str, generator: CannedGenerator) -> TestApp {
    test_app_with_video_limit(provider_url, generator, UploadConfig::default().max_video_bytes)
}

/// `test_app` with a custom cap on accepted video size.
pub fn test_app_with_video_limit(
    provider_url: &str,
    generator: CannedGenerator,
    max_video_bytes: usize,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.oauth.userinfo_url = format!("{}/userinfo", provider_url);
    config.oauth.login = client_section(provider_url, "login-client");
    config.oauth.upload = client_section(provider_url, "upload-client");
    config.upload = UploadConfig {
        endpoint: format!("{}/upload", provider_url),
        chunk_size_bytes: 256 * 1024,
        temp_root: Some(dir.path().join("scratch")),
        max_video_bytes,
        ..UploadConfig::default()
    };

    let credentials =
        Arc::new(CredentialStore::new(dir.path().join("youtube_credentials.json"), None).unwrap());
    let uploader = VideoUploader::new(config.upload.clone(), credentials).unwrap();

    let state = AppState {
        server: config.server.clone(),
        sessions: SessionStore::new(COOKIE_NAME, 3600, 600),
        oauth: Arc::new(OAuthManager::from_config(&config).unwrap()),
        users: Arc::new(UserStore::new(dir.path().join("user_data.json"))),
        uploader: Arc::new(uploader),
        content: Arc::new(ContentService::new(Arc::new(generator))),
    };

    TestApp {
        router: create_router(state),
        dir,
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` pair from the response's `Set-Cookie`, ready for a `Cookie`
/// request header.
pub fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Value of `name` in the query string of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}
