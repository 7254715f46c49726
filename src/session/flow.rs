//! Authorization code flow: consent redirect, code exchange, session mint.
//!
//! `begin` is stateless; `complete` runs the exchange, asks Spotify who the
//! user is, and either refreshes that account's existing session or mints a
//! new id. Re-authorizing the same account always lands on the same id.

use crate::config::OAuthConfig;
use crate::credentials::{CredentialStore, SessionRecord};
use crate::error::{SessionError, SessionResult};
use crate::oauth;
use crate::session::id::mint_with_rng;
use crate::session::TokenRefresher;
use crate::spotify::SpotifyClient;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Attempts at drawing an id not already used by another account.
const MAX_MINT_ATTEMPTS: usize = 8;

/// Outcome of a completed authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintedSession {
    pub session_id: String,
    pub display_name: String,
    /// True when an existing session for this account was updated
    pub reused: bool,
}

pub struct AuthorizationFlow {
    oauth: Arc<OAuthConfig>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<TokenRefresher>,
    http: reqwest::Client,
    api_base_url: String,
    /// Guards find-or-mint so two callbacks for one account can't mint twice
    mint_lock: Mutex<()>,
}

impl AuthorizationFlow {
    pub fn new(
        oauth: Arc<OAuthConfig>,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<TokenRefresher>,
        http: reqwest::Client,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            oauth,
            store,
            refresher,
            http,
            api_base_url: api_base_url.into(),
            mint_lock: Mutex::new(()),
        }
    }

    /// Consent URL for the fixed scope set. Nothing is persisted.
    pub fn begin(&self) -> String {
        self.oauth.build_auth_url()
    }

    /// Exchange `code` and bind the resulting token to a session id.
    ///
    /// # Errors
    /// * `AuthorizationDenied` - missing, malformed, expired or reused code,
    ///   or the profile lookup with the fresh token failed
    /// * `Storage` - the session could not be persisted
    pub async fn complete(&self, code: &str) -> SessionResult<MintedSession> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SessionError::AuthorizationDenied(
                "missing authorization code".to_string(),
            ));
        }

        let token = oauth::exchange_code(&self.http, &self.oauth, code)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization code exchange failed");
                SessionError::AuthorizationDenied(e.to_string())
            })?;

        let client = SpotifyClient::new(
            self.http.clone(),
            self.api_base_url.clone(),
            token.access_token.clone(),
        );
        let profile = client.current_user().await.map_err(|e| {
            warn!(error = %e, "Profile lookup after code exchange failed");
            SessionError::AuthorizationDenied(format!("could not read Spotify profile: {}", e))
        })?;
        let display_name = profile.name().to_string();
        debug!(account = %profile.id, "Authorized Spotify account");

        let _guard = self.mint_lock.lock().await;

        if let Some(mut existing) = self.store.find_by_identity(&profile.id).map_err(storage)? {
            // A refresh in flight for this session must not land on top of the new grant
            let _session = self.refresher.lock_session(&existing.session_id).await;
            existing.token = token;
            existing.display_name = display_name.clone();
            existing.updated_at = Utc::now();
            self.store.put(&existing).map_err(storage)?;

            info!(session_id = %existing.session_id, "Re-authorized existing session");
            return Ok(MintedSession {
                session_id: existing.session_id,
                display_name,
                reused: true,
            });
        }

        let session_id = self.unused_session_id(&display_name)?;
        self.store
            .put(&SessionRecord::new(
                session_id.clone(),
                profile.id,
                display_name.clone(),
                token,
            ))
            .map_err(storage)?;

        info!(session_id = %session_id, "Minted new session");
        Ok(MintedSession {
            session_id,
            display_name,
            reused: false,
        })
    }

    fn unused_session_id(&self, display_name: &str) -> SessionResult<String> {
        self.unused_session_id_with(display_name, &mut rand::thread_rng())
    }

    fn unused_session_id_with<R: Rng + ?Sized>(
        &self,
        display_name: &str,
        rng: &mut R,
    ) -> SessionResult<String> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let candidate = mint_with_rng(display_name, rng);
            if self.store.get(&candidate).map_err(storage)?.is_none() {
                return Ok(candidate);
            }
            debug!(candidate = %candidate, "Session id already taken, drawing again");
        }
        Err(SessionError::Storage(format!(
            "no free session id for '{}' after {} attempts",
            display_name, MAX_MINT_ATTEMPTS
        )))
    }
}

fn storage(e: anyhow::Error) -> SessionError {
    SessionError::Storage(e.to_string())
}
