//! Access token refresh, serialized per session.
//!
//! Two tool calls for the same stale session must not both hit the token
//! endpoint: with refresh-token rotation the second exchange can invalidate
//! the first. Each session id gets its own async mutex; whoever holds it
//! re-reads the stored record before deciding to refresh, so waiters pick up
//! the token the first caller already wrote back.

use crate::config::OAuthConfig;
use crate::credentials::{CredentialStore, SessionRecord, TokenRecord};
use crate::error::{SessionError, SessionResult};
use crate::oauth;
use chrono::Duration;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

pub struct TokenRefresher {
    http: reqwest::Client,
    oauth: Arc<OAuthConfig>,
    store: Arc<dyn CredentialStore>,
    skew: Duration,
    /// One lock per session id that has ever needed a refresh
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenRefresher {
    /// `skew` is clamped to zero if negative.
    pub fn new(
        http: reqwest::Client,
        oauth: Arc<OAuthConfig>,
        store: Arc<dyn CredentialStore>,
        skew: Duration,
    ) -> Self {
        Self {
            http,
            oauth,
            store,
            skew: skew.max(Duration::zero()),
            locks: DashMap::new(),
        }
    }

    pub fn is_stale(&self, token: &TokenRecord) -> bool {
        token.is_expired(self.skew)
    }

    /// Return a usable token for `record`, refreshing and persisting it first
    /// if it is stale.
    ///
    /// # Errors
    /// * `RefreshDenied` - the token endpoint rejected the refresh token or
    ///   could not be reached. Not retried.
    /// * `SessionNotFound` - the session vanished from the store mid-refresh.
    /// * `Storage` - the refreshed token could not be written back.
    pub async fn ensure_fresh(&self, record: SessionRecord) -> SessionResult<TokenRecord> {
        if !self.is_stale(&record.token) {
            return Ok(record.token);
        }

        let session_id = record.session_id;
        let _guard = self.lock_session(&session_id).await;

        // Someone may have refreshed while we waited for the lock
        let current = self
            .store
            .get(&session_id)
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.clone()))?;
        if !self.is_stale(&current.token) {
            debug!(session_id = %session_id, "Token already refreshed by a concurrent call");
            return Ok(current.token);
        }

        debug!(session_id = %session_id, expires_at = %current.token.expires_at, "Refreshing access token");
        let mut refreshed =
            oauth::refresh_access_token(&self.http, &self.oauth, &current.token.refresh_token)
                .await
                .map_err(|e| {
                    warn!(session_id = %session_id, error = %e, "Token refresh denied");
                    SessionError::RefreshDenied(e.to_string())
                })?;
        if refreshed.scope.is_empty() {
            refreshed.scope = current.token.scope;
        }

        // Only replace the grant that was exchanged; a newer one wins
        let latest = self
            .store
            .get(&session_id)
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.clone()))?;
        if latest.token.refresh_token != current.token.refresh_token {
            warn!(session_id = %session_id, "Session re-authorized during refresh, keeping the newer grant");
            return Ok(latest.token);
        }

        let updated = self
            .store
            .update_token(&session_id, &refreshed)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        if !updated {
            return Err(SessionError::SessionNotFound(session_id));
        }

        info!(session_id = %session_id, expires_at = %refreshed.expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    /// Hold the refresh lock for `session_id`. Anything that replaces a
    /// session's token outside of a refresh must write under this guard.
    pub async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
