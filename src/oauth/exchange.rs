//! OAuth token endpoint exchanges.
//!
//! Handles exchanging authorization codes and refresh tokens for access tokens.

use crate::config::OAuthConfig;
use crate::credentials::TokenRecord;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Lifetime assumed when the server omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// OAuth error response body (RFC 6749 §5.2)
#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    /// Convert into a stored record. `fallback_refresh` is used when the
    /// server did not rotate the refresh token.
    fn into_record(self, fallback_refresh: Option<&str>) -> Result<TokenRecord> {
        let refresh_token = self
            .refresh_token
            .or_else(|| fallback_refresh.map(str::to_string))
            .ok_or_else(|| anyhow!("Token response did not include a refresh_token"))?;

        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let scope: BTreeSet<String> = self
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(TokenRecord {
            access_token: self.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope,
        })
    }
}

/// Exchange authorization code for an initial token pair
///
/// # Arguments
/// * `http` - Shared HTTP client (carries the request timeout)
/// * `config` - OAuth application configuration
/// * `code` - Authorization code from callback
///
/// # Returns
/// * `Ok(TokenRecord)` - Access token, refresh token, and expiration
/// * `Err` - If the exchange is rejected or the request fails
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenRecord> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];

    tracing::debug!("Exchanging authorization code for token at {}", config.token_url);

    let response = post_token_request(http, &config.token_url, &form).await?;
    response.into_record(None)
}

/// Exchange a refresh token for a new access token
///
/// If the server does not issue a new refresh token, the existing one is
/// carried over into the returned record.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenRecord> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];

    tracing::debug!("Refreshing access token at {}", config.token_url);

    let response = post_token_request(http, &config.token_url, &form).await?;
    response.into_record(Some(refresh_token))
}

async fn post_token_request(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .context("Failed to send token request")?;

    // Check response status
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!("{}", describe_error(status, &body)));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    tracing::debug!(
        "Token request successful, rotated_refresh_token={}, expires_in={:?}, token_type={:?}",
        token_response.refresh_token.is_some(),
        token_response.expires_in,
        token_response.token_type
    );

    Ok(token_response)
}

/// Render a token endpoint failure as `error: description` when the body is
/// a standard OAuth error document, or the raw body otherwise.
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        },
        Err(_) => format!("token endpoint returned {}: {}", status, body.trim()),
    }
}
