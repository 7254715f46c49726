use crate::credentials::CredentialStore;
use crate::error::{SessionError, SessionResult};
use crate::session::TokenRefresher;
use crate::spotify::SpotifyClient;
use std::sync::Arc;
use tracing::debug;

/// Per-call entry point: session id in, authenticated Spotify client out.
pub struct SessionResolver {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<TokenRefresher>,
    http: reqwest::Client,
    api_base_url: String,
}

impl SessionResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<TokenRefresher>,
        http: reqwest::Client,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            refresher,
            http,
            api_base_url: api_base_url.into(),
        }
    }

    /// Look up the session, refresh its token if stale, and hand back a client
    /// carrying the current access token.
    ///
    /// # Errors
    /// * `SessionNotFound` - unknown id; the caller should go through /login
    /// * `RefreshDenied` - the stored refresh token no longer works
    /// * `Storage` - the store could not be read
    pub async fn resolve(&self, session_id: &str) -> SessionResult<SpotifyClient> {
        let session_id = session_id.trim();
        let record = self
            .store
            .get(session_id)
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        debug!(session_id = %session_id, "Session resolved");
        let token = self.refresher.ensure_fresh(record).await?;

        Ok(SpotifyClient::new(
            self.http.clone(),
            self.api_base_url.clone(),
            token.access_token,
        ))
    }
}
