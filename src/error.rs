//! Error taxonomy shared by the OAuth, credential, upload and content services.
//!
//! Each variant maps to one failure class the HTTP layer distinguishes
//! (see `api::AppError`).

/// Service-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing input. No network call or file write was attempted.
    #[error("{0}")]
    Validation(String),

    /// The callback `state` differs from the one issued for this session.
    #[error("OAuth state mismatch (possible CSRF attack)")]
    StateMismatch,

    /// No pending `state` for this session: the flow was never started,
    /// already consumed, or expired.
    #[error("No OAuth flow in progress for this session")]
    MissingState,

    /// The provider rejected the authorization code or refresh token.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The stored credential expired and carries no refresh token.
    #[error("Stored credential expired; re-authentication required")]
    ReauthenticationRequired,

    /// No credential has been stored for this identity yet.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The provider rejected the upload after authorization succeeded.
    #[error("{0}")]
    Upload(String),

    /// The generative-text API failed.
    #[error("Content generation failed: {0}")]
    ContentGeneration(String),

    /// Reading or writing a persisted record failed.
    #[error("Storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True for the errors that require sending the user back through an
    /// OAuth flow.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated | Error::ReauthenticationRequired
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
