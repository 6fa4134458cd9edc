//! OAuth 2.0 authorization-code flow, parameterized per identity.
//!
//! Two independent instances run side by side:
//! - `Login`: read-only profile scopes, result routed to the user registry
//! - `Upload`: video upload scope, result routed to the credential store
//!
//! Per flow instance:
//! 1. `start_flow` → authorization URL + fresh state (caller stores the state
//!    in the user's session)
//! 2. User authorizes on the provider's site
//! 3. Provider redirects to the purpose's callback with `code` and `state`
//! 4. Caller takes the expected state out of the session (single use) and
//!    calls `complete_flow`, which verifies it and exchanges the code
//!
//! `NOT_STARTED → AWAITING_CALLBACK → {COMPLETED | FAILED}`. A replayed
//! callback finds no pending state and fails with `MissingState`.

mod exchange;
mod provider;

pub use provider::{load_client_secrets, ClientConfig, ClientSecrets};

use crate::config::AppConfig;
use crate::credentials::{Credential, TokenRefresher};
use crate::error::{Error, Result};
use crate::session::random_token;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Which identity a flow authorizes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowPurpose {
    Login,
    Upload,
}

impl FlowPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPurpose::Login => "login",
            FlowPurpose::Upload => "upload",
        }
    }

    pub(crate) fn env_prefix(&self) -> &'static str {
        match self {
            FlowPurpose::Login => "LOGIN",
            FlowPurpose::Upload => "UPLOAD",
        }
    }

    /// Path of the provider redirect handler for this purpose
    pub fn callback_path(&self) -> &'static str {
        match self {
            FlowPurpose::Login => "/oauth2callback",
            FlowPurpose::Upload => "/youtube_auth_callback",
        }
    }

    pub fn default_scopes(&self) -> Vec<String> {
        let scopes: &[&str] = match self {
            FlowPurpose::Login => &[
                "openid",
                "https://www.googleapis.com/auth/userinfo.email",
            ],
            FlowPurpose::Upload => &["https://www.googleapis.com/auth/youtube.upload"],
        };
        scopes.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for FlowPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorization-code client
pub struct OAuthClient {
    purpose: FlowPurpose,
    config: ClientConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(purpose: FlowPurpose, config: ClientConfig) -> Self {
        Self {
            purpose,
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn purpose(&self) -> FlowPurpose {
        self.purpose
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `(authorization_url, state)`. No side effects: persisting the
    /// state against the user's session is the caller's job.
    pub fn start_flow(&self) -> (String, String) {
        let state = random_token();
        let url = self.config.build_auth_url(&state);
        info!(purpose = %self.purpose, "OAuth flow started");
        (url, state)
    }

    /// Verify the callback state and exchange `code` for a credential.
    ///
    /// # Errors
    /// * `MissingState` - `expected_state` is `None`
    /// * `StateMismatch` - `received_state` differs from `expected_state`
    /// * `Validation` - empty `code`
    /// * `TokenExchange` - the provider rejected the code
    pub async fn complete_flow(
        &self,
        code: &str,
        received_state: &str,
        expected_state: Option<&str>,
    ) -> Result<Credential> {
        let expected = expected_state.ok_or_else(|| {
            warn!(purpose = %self.purpose, "Callback without a pending OAuth state");
            Error::MissingState
        })?;

        if received_state != expected {
            warn!(purpose = %self.purpose, "OAuth state mismatch");
            return Err(Error::StateMismatch);
        }

        if code.is_empty() {
            return Err(Error::validation("Missing 'code' parameter"));
        }

        debug!(purpose = %self.purpose, "OAuth state verified, exchanging code");

        let credential = exchange::exchange_code_for_token(&self.http, &self.config, code)
            .await
            .inspect_err(|e| warn!(purpose = %self.purpose, error = %e, "Token exchange failed"))?;

        info!(
            purpose = %self.purpose,
            has_refresh_token = credential.refresh_token.is_some(),
            "OAuth flow completed"
        );
        Ok(credential)
    }
}

#[async_trait]
impl TokenRefresher for OAuthClient {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        exchange::refresh_access_token(&self.http, &self.config, credential).await
    }
}

/// Profile returned by the "who am I" endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable provider user id (`id` in userinfo v2, `sub` in OIDC)
    #[serde(alias = "sub")]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// Owns one `OAuthClient` per `FlowPurpose`.
pub struct OAuthManager {
    login: OAuthClient,
    upload: OAuthClient,
    userinfo_url: String,
    http: reqwest::Client,
}

impl OAuthManager {
    pub fn new(login: OAuthClient, upload: OAuthClient, userinfo_url: impl Into<String>) -> Self {
        Self {
            login,
            upload,
            userinfo_url: userinfo_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let login = ClientConfig::resolve(FlowPurpose::Login, &config.oauth.login, &config.server)?;
        let upload =
            ClientConfig::resolve(FlowPurpose::Upload, &config.oauth.upload, &config.server)?;

        Ok(Self::new(
            OAuthClient::new(FlowPurpose::Login, login),
            OAuthClient::new(FlowPurpose::Upload, upload),
            config.oauth.userinfo_url.clone(),
        ))
    }

    pub fn client(&self, purpose: FlowPurpose) -> &OAuthClient {
        match purpose {
            FlowPurpose::Login => &self.login,
            FlowPurpose::Upload => &self.upload,
        }
    }

    pub fn start_flow(&self, purpose: FlowPurpose) -> (String, String) {
        self.client(purpose).start_flow()
    }

    pub async fn complete_flow(
        &self,
        purpose: FlowPurpose,
        code: &str,
        received_state: &str,
        expected_state: Option<&str>,
    ) -> Result<Credential> {
        self.client(purpose)
            .complete_flow(code, received_state, expected_state)
            .await
    }

    /// Look up the profile behind a login credential.
    pub async fn fetch_identity(&self, credential: &Credential) -> Result<Identity> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| Error::TokenExchange(format!("Failed to fetch user profile: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchange(format!(
                "userinfo endpoint returned {}: {}",
                status, body
            )));
        }

        let identity: Identity = response
            .json()
            .await
            .map_err(|e| Error::TokenExchange(format!("Failed to parse user profile: {}", e)))?;

        if identity.id.is_empty() {
            return Err(Error::TokenExchange("User profile has no id".to_string()));
        }

        Ok(identity)
    }
}
