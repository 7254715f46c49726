// Shared fixtures for router tests: a config pointed at a mock Spotify

#![allow(dead_code)]

use std::sync::Arc;
use tunebridge::config::{Config, OAuthConfig, ServerConfig, SessionConfig, StorageConfig, SCOPES};
use tunebridge::credentials::{CredentialStore, MemoryCredentialStore};
use tunebridge::session::SessionServices;

pub fn config(server_url: &str) -> Config {
    Config {
        oauth: OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            authorize_url: format!("{}/authorize", server_url),
            token_url: format!("{}/api/token", server_url),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        },
        storage: StorageConfig::default(),
        server: ServerConfig::default(),
        session: SessionConfig::default(),
        api_base_url: server_url.to_string(),
    }
}

pub fn services(server_url: &str) -> SessionServices {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    SessionServices::new(&config(server_url), store, reqwest::Client::new())
}
