//! OAuth client configuration.
//!
//! Resolved per flow purpose from, in order: explicit config values, the
//! Google client-secret JSON file, then built-in defaults.

use super::FlowPurpose;
use crate::config::{OAuthClientSection, ServerConfig};
use crate::error::{Error, Result};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Fully resolved client for one authorization-code flow
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Provider authorization endpoint
    pub auth_uri: String,
    /// Provider token endpoint
    pub token_uri: String,
    /// Must match a redirect URI registered with the provider
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Google client-secret file: `{"web": {...}}` or `{"installed": {...}}`
#[derive(Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Parse a Google client-secret JSON file.
pub fn load_client_secrets(path: &Path) -> anyhow::Result<ClientSecrets> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read client secrets {}", path.display()))?;
    let file: ClientSecretsFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse client secrets {}", path.display()))?;

    file.web
        .or(file.installed)
        .with_context(|| format!("{} has neither a 'web' nor an 'installed' section", path.display()))
}

impl ClientConfig {
    pub fn resolve(
        purpose: FlowPurpose,
        section: &OAuthClientSection,
        server: &ServerConfig,
    ) -> Result<Self> {
        let secrets = section
            .client_secrets_file
            .as_deref()
            .map(load_client_secrets)
            .transpose()
            .map_err(|e| Error::Config(format!("{:#}", e)))?;

        let client_id = section
            .client_id
            .clone()
            .or_else(|| secrets.as_ref().map(|s| s.client_id.clone()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "OAuth client for '{}' has no client_id. Set oauth.{}.client_secrets_file or SOCIALKIT_OAUTH_{}_CLIENT_ID.",
                    purpose,
                    purpose,
                    purpose.env_prefix()
                ))
            })?;

        let client_secret = section
            .client_secret
            .clone()
            .or_else(|| secrets.as_ref().map(|s| s.client_secret.clone()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "OAuth client for '{}' has no client_secret. Set oauth.{}.client_secrets_file or SOCIALKIT_OAUTH_{}_CLIENT_SECRET.",
                    purpose,
                    purpose,
                    purpose.env_prefix()
                ))
            })?;

        let auth_uri = section
            .auth_uri
            .clone()
            .or_else(|| secrets.as_ref().and_then(|s| s.auth_uri.clone()))
            .unwrap_or_else(|| GOOGLE_AUTH_URI.to_string());

        let token_uri = section
            .token_uri
            .clone()
            .or_else(|| secrets.as_ref().and_then(|s| s.token_uri.clone()))
            .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string());

        // A registered redirect URI for this purpose's callback wins over the
        // derived default.
        let redirect_uri = section
            .redirect_uri
            .clone()
            .or_else(|| {
                secrets.as_ref().and_then(|s| {
                    s.redirect_uris
                        .iter()
                        .find(|uri| uri.ends_with(purpose.callback_path()))
                        .cloned()
                })
            })
            .unwrap_or_else(|| {
                format!(
                    "{}{}",
                    server.public_base_url.trim_end_matches('/'),
                    purpose.callback_path()
                )
            });

        let scopes = section
            .scopes
            .clone()
            .unwrap_or_else(|| purpose.default_scopes());

        Ok(Self {
            client_id,
            client_secret,
            auth_uri,
            token_uri,
            redirect_uri,
            scopes,
        })
    }

    /// Build the provider authorization URL.
    ///
    /// Requests offline access and forces the consent screen so the provider
    /// issues a fresh refresh token on every completed flow.
    pub fn build_auth_url(&self, state: &str) -> String {
        let scope = self.scopes.join(" ");
        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("include_granted_scopes", "true"),
        ];
        // Serializing a slice of string pairs cannot fail
        let query = serde_urlencoded::to_string(params).unwrap_or_default();

        let separator = if self.auth_uri.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.auth_uri, separator, query)
    }
}
