//! Token endpoint calls: authorization-code exchange and refresh.

use super::provider::ClientConfig;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

/// Lifetime assumed when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Upper bound on a reported lifetime (one year)
const MAX_EXPIRES_IN: i64 = 365 * 24 * 60 * 60;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Space-separated granted scopes
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, requested: &[String], previous_refresh: Option<&str>) -> Credential {
        let scopes: BTreeSet<String> = match self.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(String::from).collect()
            }
            _ => requested.iter().cloned().collect(),
        };

        let expires_in = self
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN)
            .clamp(0, MAX_EXPIRES_IN);
        let now = Utc::now();

        Credential {
            access_token: self.access_token,
            // Providers may not rotate the refresh token on refresh
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(String::from)),
            scopes,
            expiry: now
                .checked_add_signed(Duration::seconds(expires_in))
                .unwrap_or(now),
        }
    }
}

/// Exchange an authorization code for a credential.
pub(super) async fn exchange_code_for_token(
    http: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
) -> Result<Credential> {
    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("code", code);
    form.insert("redirect_uri", config.redirect_uri.as_str());
    form.insert("client_id", config.client_id.as_str());
    form.insert("client_secret", config.client_secret.as_str());

    tracing::debug!("Exchanging authorization code for token at {}", config.token_uri);

    let token_response = post_token_form(http, &config.token_uri, &form).await?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        token_response.refresh_token.is_some(),
        token_response.expires_in
    );

    Ok(token_response.into_credential(&config.scopes, None))
}

/// Mint a new access token from `credential`'s refresh token.
pub(super) async fn refresh_access_token(
    http: &reqwest::Client,
    config: &ClientConfig,
    credential: &Credential,
) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or(Error::ReauthenticationRequired)?;

    let mut form = HashMap::new();
    form.insert("grant_type", "refresh_token");
    form.insert("refresh_token", refresh_token);
    form.insert("client_id", config.client_id.as_str());
    form.insert("client_secret", config.client_secret.as_str());

    tracing::debug!("Refreshing access token at {}", config.token_uri);

    let token_response = post_token_form(http, &config.token_uri, &form).await?;

    let requested: Vec<String> = credential.scopes.iter().cloned().collect();
    Ok(token_response.into_credential(&requested, Some(refresh_token)))
}

async fn post_token_form(
    http: &reqwest::Client,
    token_url: &str,
    form: &HashMap<&str, &str>,
) -> Result<TokenResponse> {
    let response = http
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| Error::TokenExchange(format!("Failed to send token request: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::TokenExchange(format!("Failed to parse token response: {}", e)))
}
