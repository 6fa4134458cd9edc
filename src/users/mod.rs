//! Daily-rotated registry of signed-in users.
//!
//! File format:
//!
//! ```json
//! {
//!   "users": { "<user_id>": { "email": "...", "login_time": "2025-01-31 18:04:11" } },
//!   "last_updated": "2025-01-31"
//! }
//! ```
//!
//! Every operation loads the whole file, applies the rotation rule, and (for
//! writes) overwrites the whole file. There is no locking; concurrent writers
//! can lose updates.

use crate::error::{Error, Result};
use crate::oauth::Identity;
use crate::storage;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOGIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Profile snapshot taken at login
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub login_time: String,
}

/// All users seen since `last_updated`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRegistry {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
    pub last_updated: NaiveDate,
}

impl UserRegistry {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            users: BTreeMap::new(),
            last_updated: now.date_naive(),
        }
    }

    /// True once `last_updated` (taken as midnight UTC) is more than 24 hours
    /// behind `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let updated_at = self.last_updated.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        match updated_at {
            Some(updated_at) => now - updated_at > Duration::hours(24),
            None => true,
        }
    }
}

/// File-backed `UserRegistry`
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Record a login for `identity` and return its user id.
    pub fn upsert(&self, identity: &Identity) -> Result<String> {
        self.upsert_at(identity, Utc::now())
    }

    /// `upsert` with an explicit clock.
    pub fn upsert_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String> {
        if identity.id.is_empty() {
            return Err(Error::validation("User profile has no id"));
        }

        let mut registry = self.load_at(now)?;
        registry.users.insert(
            identity.id.clone(),
            UserRecord {
                email: identity.email.clone(),
                login_time: now.format(LOGIN_TIME_FORMAT).to_string(),
            },
        );
        registry.last_updated = now.date_naive();

        storage::write_json_atomic(&self.path, &registry).map_err(Error::Storage)?;

        info!(user_id = %identity.id, users = registry.users.len(), "User login recorded");
        Ok(identity.id.clone())
    }

    pub fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.load_at(Utc::now())?.users.remove(user_id))
    }

    /// Load the registry as of `now`, rotated if stale.
    ///
    /// A missing or unreadable file yields an empty registry.
    pub fn load_at(&self, now: DateTime<Utc>) -> Result<UserRegistry> {
        let registry = match storage::read_json::<UserRegistry>(&self.path) {
            Ok(Some(registry)) => registry,
            Ok(None) => return Ok(UserRegistry::empty(now)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %format!("{:#}", e), "Discarding unreadable user registry");
                return Ok(UserRegistry::empty(now));
            }
        };

        if registry.is_stale(now) {
            info!(
                last_updated = %registry.last_updated,
                dropped = registry.users.len(),
                "User registry rotated"
            );
            return Ok(UserRegistry::empty(now));
        }

        Ok(registry)
    }
}
