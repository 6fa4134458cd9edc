//! File-backed credential store for the upload identity.
//!
//! One JSON record per store. Tokens are kept in plain text unless an
//! encryption key is configured, in which case each token is sealed.

use super::{Credential, SealedToken, TokenCipher, TokenRefresher};
use crate::error::{Error, Result};
use crate::storage;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk token: a bare string, or a sealed `{ciphertext, nonce}` object.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredToken {
    Plain(String),
    Sealed(SealedToken),
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    access_token: StoredToken,
    #[serde(default)]
    refresh_token: Option<StoredToken>,
    #[serde(default)]
    scopes: BTreeSet<String>,
    expiry: DateTime<Utc>,
}

/// Persists exactly one `Credential` at `path`.
///
/// Login and upload identities must use different paths: their scopes
/// differ and one must never stand in for the other.
pub struct CredentialStore {
    path: PathBuf,
    cipher: Option<TokenCipher>,
}

impl CredentialStore {
    /// # Arguments
    /// * `path` - JSON record location
    /// * `encryption_key` - Optional base64 32-byte key for sealing tokens
    pub fn new<P: AsRef<Path>>(path: P, encryption_key: Option<&str>) -> anyhow::Result<Self> {
        let cipher = encryption_key
            .map(TokenCipher::from_base64)
            .transpose()
            .context("Invalid encryption key")?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            cipher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record exists. Does not validate it.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored credential, if any.
    pub fn load(&self) -> Result<Option<Credential>> {
        let stored: Option<StoredCredential> =
            storage::read_json(&self.path).map_err(Error::Storage)?;

        stored
            .map(|s| self.decode(s))
            .transpose()
            .map_err(Error::Storage)
    }

    /// Atomically overwrite the stored credential.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let stored = self.encode(credential).map_err(Error::Storage)?;
        storage::write_json_atomic(&self.path, &stored)
            .context("Failed to persist credential")
            .map_err(Error::Storage)?;

        debug!(
            path = %self.path.display(),
            expiry = %credential.expiry,
            has_refresh_token = credential.refresh_token.is_some(),
            "Credential saved"
        );
        Ok(())
    }

    /// Return a currently valid credential, refreshing and persisting it
    /// first if it has expired.
    ///
    /// # Errors
    /// * `NotAuthenticated` - nothing stored yet
    /// * `ReauthenticationRequired` - expired with no usable refresh token,
    ///   or the provider rejected the refresh token
    pub async fn load_or_refresh(&self, refresher: &dyn TokenRefresher) -> Result<Credential> {
        let credential = self.load()?.ok_or(Error::NotAuthenticated)?;

        if credential.is_valid() {
            return Ok(credential);
        }

        if !credential.is_refreshable() {
            warn!(path = %self.path.display(), "Stored credential expired without refresh token");
            return Err(Error::ReauthenticationRequired);
        }

        info!(expired_at = %credential.expiry, "Refreshing expired credential");
        let refreshed = match refresher.refresh(&credential).await {
            Ok(refreshed) => refreshed,
            Err(Error::TokenExchange(msg)) => {
                warn!(error = %msg, "Provider rejected refresh token");
                return Err(Error::ReauthenticationRequired);
            }
            Err(e) => return Err(e),
        };

        self.save(&refreshed)?;
        info!(expiry = %refreshed.expiry, "Credential refreshed");
        Ok(refreshed)
    }

    fn encode(&self, credential: &Credential) -> anyhow::Result<StoredCredential> {
        Ok(StoredCredential {
            access_token: self.seal(&credential.access_token)?,
            refresh_token: credential
                .refresh_token
                .as_deref()
                .map(|t| self.seal(t))
                .transpose()?,
            scopes: credential.scopes.clone(),
            expiry: credential.expiry,
        })
    }

    fn decode(&self, stored: StoredCredential) -> anyhow::Result<Credential> {
        Ok(Credential {
            access_token: self
                .open(stored.access_token)
                .context("Failed to read access token")?,
            refresh_token: stored
                .refresh_token
                .map(|t| self.open(t))
                .transpose()
                .context("Failed to read refresh token")?,
            scopes: stored.scopes,
            expiry: stored.expiry,
        })
    }

    fn seal(&self, token: &str) -> anyhow::Result<StoredToken> {
        match &self.cipher {
            Some(cipher) => Ok(StoredToken::Sealed(cipher.seal(token)?)),
            None => Ok(StoredToken::Plain(token.to_string())),
        }
    }

    fn open(&self, token: StoredToken) -> anyhow::Result<String> {
        match (token, &self.cipher) {
            (StoredToken::Plain(value), _) => Ok(value),
            (StoredToken::Sealed(sealed), Some(cipher)) => cipher.open(&sealed),
            (StoredToken::Sealed(_), None) => Err(anyhow!(
                "Token is sealed but no encryption key is configured"
            )),
        }
    }
}
