//! Session lifecycle: mint ids, keep tokens fresh, resolve ids to clients.
//!
//! ```text
//!  /callback ──► AuthorizationFlow ──► CredentialStore ◄── TokenRefresher
//!                                           ▲                   ▲
//!  tool call ──► SessionResolver ───────────┴───────────────────┘
//! ```

pub mod flow;
pub mod id;
mod refresher;
mod resolver;

pub use flow::{AuthorizationFlow, MintedSession};
pub use id::mint_session_id;
pub use refresher::TokenRefresher;
pub use resolver::SessionResolver;

use crate::config::Config;
use crate::credentials::CredentialStore;
use std::sync::Arc;

/// The session components wired to one store and one HTTP client.
#[derive(Clone)]
pub struct SessionServices {
    pub store: Arc<dyn CredentialStore>,
    pub refresher: Arc<TokenRefresher>,
    pub resolver: Arc<SessionResolver>,
    pub flow: Arc<AuthorizationFlow>,
}

impl SessionServices {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>, http: reqwest::Client) -> Self {
        let oauth = Arc::new(config.oauth.clone());
        let refresher = Arc::new(TokenRefresher::new(
            http.clone(),
            Arc::clone(&oauth),
            Arc::clone(&store),
            config.session.refresh_skew(),
        ));
        let resolver = Arc::new(SessionResolver::new(
            Arc::clone(&store),
            Arc::clone(&refresher),
            http.clone(),
            config.api_base_url.clone(),
        ));
        let flow = Arc::new(AuthorizationFlow::new(
            oauth,
            Arc::clone(&store),
            Arc::clone(&refresher),
            http,
            config.api_base_url.clone(),
        ));

        Self {
            store,
            refresher,
            resolver,
            flow,
        }
    }
}

/// Shared HTTP client with the configured request timeout.
pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .user_agent(concat!("tunebridge/", env!("CARGO_PKG_VERSION")))
        .timeout(config.session.http_timeout())
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests;
