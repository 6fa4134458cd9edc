//! OAuth credential for the video-upload identity and its durable store.
//!
//! ```text
//!  load_or_refresh()
//!        │
//!   record on disk? ── no ──▶ NotAuthenticated
//!        │ yes
//!   expiry > now?  ── yes ─▶ return as-is
//!        │ no
//!   refresh token? ── no ──▶ ReauthenticationRequired
//!        │ yes
//!   TokenRefresher::refresh ─▶ persist (atomic overwrite) ─▶ return
//! ```
//!
//! The store is single-writer. Two concurrent refreshes both hit the provider
//! and the later write wins; deployments run one upload at a time.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod cipher;
mod store;

pub use cipher::{SealedToken, TokenCipher};
pub use store::CredentialStore;

/// OAuth2 token set for one identity/scope-set pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API requests
    pub access_token: String,

    /// Used to mint a new access token once this one expires
    pub refresh_token: Option<String>,

    /// Scopes granted by the provider
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// When the access token stops being accepted (UTC)
    pub expiry: DateTime<Utc>,
}

impl Credential {
    /// Valid only while `expiry` is in the future.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Exchanges a refresh token for a fresh credential.
///
/// Implemented by `oauth::OAuthClient`; tests substitute a stub.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}
