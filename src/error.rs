//! Typed failures of the session lifecycle.
//!
//! Every variant renders as a message meant for a person (or an agent relaying
//! to one), so the tool surface can hand `to_string()` straight back.

use thiserror::Error;

/// Failure kinds surfaced by the session resolver and the authorization flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No stored session under the supplied id.
    #[error(
        "Session '{0}' not found. Please visit /login in your browser to authenticate with Spotify and get a session id."
    )]
    SessionNotFound(String),

    /// The authorization server refused (or never answered) a refresh exchange.
    #[error(
        "Your Spotify authorization has expired or was revoked ({0}). Please visit /login to authenticate again."
    )]
    RefreshDenied(String),

    /// The authorization code could not be exchanged.
    #[error("Spotify authorization failed: {0}. Please retry from /login.")]
    AuthorizationDenied(String),

    /// The music service rejected or failed a call.
    #[error("{0}")]
    VendorApi(String),

    /// The credential store could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Whether the caller has to go through `/login` again to recover.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            SessionError::SessionNotFound(_)
                | SessionError::RefreshDenied(_)
                | SessionError::AuthorizationDenied(_)
        )
    }
}

/// Result alias for session lifecycle operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
