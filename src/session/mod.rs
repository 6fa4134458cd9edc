//! Cookie-keyed server-side sessions.
//!
//! A session carries the signed-in login identity and, per `FlowPurpose`, at
//! most one pending OAuth state. Taking a pending state removes it, so every
//! issued state is redeemable at most once.

use crate::oauth::FlowPurpose;
use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;

/// 256 bits of OS randomness, URL-safe base64 without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issued anti-CSRF state awaiting its callback
#[derive(Clone, Debug)]
struct PendingState {
    value: String,
    issued_at: DateTime<Utc>,
}

/// Signed-in login identity
#[derive(Clone, Debug, PartialEq)]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
}

#[derive(Clone, Debug)]
struct Session {
    user: Option<SessionUser>,
    pending: HashMap<FlowPurpose, PendingState>,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            user: None,
            pending: HashMap::new(),
            last_seen: Utc::now(),
        }
    }
}

/// In-memory session table with idle and state expiry
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    cookie_name: String,
    session_ttl: Duration,
    state_ttl: Duration,
}

impl SessionStore {
    /// # Arguments
    /// * `cookie_name` - Name of the session cookie
    /// * `session_ttl_seconds` - Idle time after which a session is dropped
    /// * `state_ttl_seconds` - How long an issued OAuth state stays redeemable
    pub fn new(cookie_name: impl Into<String>, session_ttl_seconds: i64, state_ttl_seconds: i64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            cookie_name: cookie_name.into(),
            session_ttl: Duration::seconds(session_ttl_seconds),
            state_ttl: Duration::seconds(state_ttl_seconds),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Session id from the request's `Cookie` header, if it names a live
    /// session.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        let id = cookie_value(headers, &self.cookie_name)?;
        let mut session = self.sessions.get_mut(&id)?;
        session.last_seen = Utc::now();
        Some(id)
    }

    /// Existing session id or a new one. The flag is true when a session was
    /// created and its cookie must be set on the response.
    pub fn resolve(&self, headers: &HeaderMap) -> (String, bool) {
        match self.session_id(headers) {
            Some(id) => (id, false),
            None => {
                let id = random_token();
                self.sessions.insert(id.clone(), Session::new());
                (id, true)
            }
        }
    }

    /// `Set-Cookie` value binding the browser to `session_id`.
    pub fn cookie(&self, session_id: &str) -> HeaderValue {
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            session_id,
            self.session_ttl.num_seconds()
        );
        // Session ids are base64url, so the header value is always visible ASCII
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// `Set-Cookie` value that deletes the session cookie.
    pub fn expired_cookie(&self) -> HeaderValue {
        let value = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.cookie_name);
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Record the state issued for `purpose`, replacing any earlier one.
    pub fn put_state(&self, session_id: &str, purpose: FlowPurpose, state: &str) {
        let mut session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new);
        session.pending.insert(
            purpose,
            PendingState {
                value: state.to_string(),
                issued_at: Utc::now(),
            },
        );
    }

    /// Remove and return the pending state for `purpose`.
    ///
    /// Returns `None` if none was issued, it was already taken, or it expired.
    pub fn take_state(&self, session_id: &str, purpose: FlowPurpose) -> Option<String> {
        let mut session = self.sessions.get_mut(session_id)?;
        let pending = session.pending.remove(&purpose)?;

        if Utc::now() - pending.issued_at > self.state_ttl {
            return None;
        }

        Some(pending.value)
    }

    /// Sign `user` in under a fresh session id and drop `previous`.
    ///
    /// Returns the new id; the caller must send its cookie.
    pub fn sign_in(&self, previous: Option<&str>, user: SessionUser) -> String {
        if let Some(previous) = previous {
            self.sessions.remove(previous);
        }

        let id = random_token();
        let mut session = Session::new();
        session.user = Some(user);
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn user(&self, session_id: &str) -> Option<SessionUser> {
        self.sessions.get(session_id)?.user.clone()
    }

    /// Drop the session entirely (logout).
    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Evict idle sessions and expired pending states.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.sessions
            .retain(|_, session| now - session.last_seen <= self.session_ttl);

        for mut session in self.sessions.iter_mut() {
            session
                .pending
                .retain(|_, pending| now - pending.issued_at <= self.state_ttl);
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Value of cookie `name` in the request's `Cookie` header(s).
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Background task to periodically evict expired sessions and states
pub async fn run_session_cleanup(store: SessionStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!("Session cleanup complete, {} sessions remaining", store.count());
    }
}
