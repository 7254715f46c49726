//! Session credential storage.
//!
//! Maps a human-readable session id to the Spotify token pair it stands for.
//! Two backends satisfy the same [`CredentialStore`] contract:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (trait)            │
//! │  - get / put / find_by_identity          │
//! └─────────────────────────────────────────┘
//!          ↓                    ↓
//! ┌──────────────────┐  ┌──────────────────────┐
//! │ MemoryCredential │  │ SqliteCredential     │
//! │ Store (DashMap)  │  │ Store (sessions tbl) │
//! └──────────────────┘  └──────────────────────┘
//! ```
//!
//! The memory backend loses every session when the process exits. Use it only
//! for a single instance where re-authenticating after a restart is acceptable.
//!
//! # Usage
//!
//! ```no_run
//! use tunebridge::credentials::{open_store, SessionRecord, TokenRecord};
//! use tunebridge::config::StorageConfig;
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = open_store(&StorageConfig {
//!     database: Some("sessions.db".to_string()),
//! })?;
//!
//! let token = TokenRecord {
//!     access_token: "access".to_string(),
//!     refresh_token: "refresh".to_string(),
//!     expires_at: Utc::now() + Duration::hours(1),
//!     scope: Default::default(),
//! };
//! store.put(&SessionRecord::new("dj-max-123", "spotify-user-id", "DJ Max", token))?;
//!
//! if let Some(session) = store.find_by_identity("spotify-user-id")? {
//!     println!("Session: {}", session.session_id);
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::StorageConfig;

mod memory;
mod storage;

pub use memory::MemoryCredentialStore;
pub use storage::SqliteCredentialStore;

/// OAuth token pair for one Spotify account.
///
/// The access token is usable only while `now < expires_at`. The refresh
/// token is long-lived and never leaves the store/refresher boundary; `Debug`
/// output redacts both.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// OAuth access token (used for API requests)
    pub access_token: String,

    /// OAuth refresh token (used to obtain new access tokens)
    pub refresh_token: String,

    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,

    /// Granted scopes
    #[serde(default)]
    pub scope: BTreeSet<String>,
}

impl TokenRecord {
    /// Whether the access token should be treated as expired.
    ///
    /// A token counts as expired `skew` before its literal expiry.
    pub fn is_expired(&self, skew: Duration) -> bool {
        self.expires_at - Utc::now() < skew
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A minted session: the shareable id plus the credential it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// `{sanitized-display-name}-{3-digit-suffix}`
    pub session_id: String,

    /// Stable Spotify account id, used to find an existing session on re-authorization
    pub owner_identity: String,

    /// Display name at the time of the last authorization
    pub display_name: String,

    pub token: TokenRecord,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        session_id: impl Into<String>,
        owner_identity: impl Into<String>,
        display_name: impl Into<String>,
        token: TokenRecord,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            owner_identity: owner_identity.into(),
            display_name: display_name.into(),
            token,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Keyed storage of `session_id → SessionRecord`.
///
/// Implementations must be safe for concurrent use from many request tasks;
/// each serializes access through its own locking.
pub trait CredentialStore: Send + Sync {
    /// Fetch a session by id. `Ok(None)` when absent.
    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace the record stored under `record.session_id`.
    fn put(&self, record: &SessionRecord) -> Result<()>;

    /// Fetch the session owned by a Spotify account id. `Ok(None)` when absent.
    fn find_by_identity(&self, owner_identity: &str) -> Result<Option<SessionRecord>>;

    /// Number of stored sessions.
    fn count(&self) -> Result<usize>;

    /// Replace the token of an existing session.
    ///
    /// Returns `Ok(false)` if the session does not exist.
    fn update_token(&self, session_id: &str, token: &TokenRecord) -> Result<bool> {
        match self.get(session_id)? {
            Some(mut record) => {
                record.token = token.clone();
                record.updated_at = Utc::now();
                self.put(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Open the backend selected by configuration.
///
/// The durable backend creates its schema idempotently on open.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn CredentialStore>> {
    match &config.database {
        Some(path) => {
            let store = SqliteCredentialStore::new(path)?;
            info!(database = %path, sessions = store.count()?, "SQLite credential store opened");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database configured; sessions are kept in memory and lost on restart");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}
