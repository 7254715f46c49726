//! OAuth application configuration for the Spotify authorization server.

use serde::{Deserialize, Serialize};

/// Fixed permission set requested at consent time.
pub const SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-read-recently-played",
];

/// OAuth application registration and endpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Client ID (from environment variable)
    pub client_id: String,

    /// Client secret (from environment variable)
    #[serde(skip_serializing)]
    pub client_secret: String,

    /// Registered redirect URI (must match the app registration exactly)
    pub redirect_uri: String,

    /// OAuth authorization endpoint URL
    pub authorize_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Requested OAuth scopes
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Build the consent URL the browser is redirected to.
    pub fn build_auth_url(&self) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
        )
    }
}
