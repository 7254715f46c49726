//! Process configuration: required environment variables plus optional TOML tunables.

pub mod oauth;
pub use oauth::{OAuthConfig, SCOPES};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;

pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const ENV_DATABASE: &str = "TUNEBRIDGE_DATABASE";
pub const ENV_BIND: &str = "TUNEBRIDGE_BIND";
pub const ENV_CONFIG: &str = "TUNEBRIDGE_CONFIG";

/// Complete process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    /// Base URL of the vendor Web API (no trailing slash).
    pub api_base_url: String,
}

/// Where session records live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageConfig {
    /// SQLite database path. `None` selects the in-memory store.
    pub database: Option<String>,
}

/// Tunables read from the optional TOML file. Every section has defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tunables {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8888".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Token lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Treat an access token as expired this many seconds before `expires_at`.
    #[serde(default = "default_refresh_skew")]
    pub refresh_skew_seconds: u64,
    /// Timeout applied to every authorization server and vendor API request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

fn default_refresh_skew() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_skew_seconds: default_refresh_skew(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

impl SessionConfig {
    /// Saturates at the largest representable duration.
    pub fn refresh_skew(&self) -> chrono::Duration {
        i64::try_from(self.refresh_skew_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Vendor endpoints (overridable so tests can point at a mock server)
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_authorize_url() -> String {
    "https://accounts.spotify.com/authorize".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Config {
    /// Build from process environment variables.
    ///
    /// Missing client id, client secret or redirect URI is an error; callers
    /// treat it as fatal at startup.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            get(name).ok_or_else(|| anyhow!("{} must be set (see .env.example)", name))
        };

        let client_id = required(ENV_CLIENT_ID)?;
        let client_secret = required(ENV_CLIENT_SECRET)?;
        let redirect_uri = required(ENV_REDIRECT_URI)?;

        let mut tunables = match get(ENV_CONFIG) {
            Some(path) => load_tunables(&path)
                .with_context(|| format!("Failed to load {} from {}", ENV_CONFIG, path))?,
            None => Tunables::default(),
        };
        if let Some(bind) = get(ENV_BIND) {
            tunables.server.bind = bind;
        }

        Ok(Self {
            oauth: OAuthConfig {
                client_id,
                client_secret,
                redirect_uri,
                authorize_url: tunables.endpoints.authorize_url,
                token_url: tunables.endpoints.token_url,
                scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            },
            storage: StorageConfig {
                database: get(ENV_DATABASE),
            },
            server: tunables.server,
            session: tunables.session,
            api_base_url: tunables.endpoints.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Load tunables from a TOML file
pub fn load_tunables(path: &str) -> Result<Tunables> {
    let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
    let tunables: Tunables = toml::from_str(&contents).context("Failed to parse config file")?;
    Ok(tunables)
}

/// Config with every endpoint pointed at `server_url` (a mock server).
#[cfg(test)]
pub(crate) fn test_config(server_url: &str) -> Config {
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
