//! Thin Spotify Web API client.
//!
//! Only the calls the tool surface needs. A client is built per tool call
//! from the session's current access token; it holds no other state.

mod types;

pub use types::{Artist, Paging, PlayHistory, Playback, Playlist, PlaylistTracks, Track, UserProfile};

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Upper bound on followed `next` links when listing playlists.
const MAX_PLAYLIST_PAGES: usize = 10;

/// HTTP client for the Spotify Web API.
///
/// Authenticates every request with the session's Bearer token.
#[derive(Clone)]
pub struct SpotifyClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SpotifyClient {
    /// Create a client against `base_url` (e.g. `https://api.spotify.com/v1`).
    pub fn new(http_client: Client, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            http_client,
            base_url: base_url.into(),
        }
    }

    /// The bearer token this client sends.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Fetch the authenticated user's profile ("whoami").
    pub async fn current_user(&self) -> Result<UserProfile> {
        let response = self
            .http_client
            .get(format!("{}/me", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send current_user request")?;

        parse_json(response, "profile").await
    }

    /// Search tracks and return the first hit, if any.
    pub async fn search_track(&self, query: &str) -> Result<Option<Track>> {
        #[derive(Deserialize)]
        struct SearchResponse {
            tracks: Paging<Track>,
        }

        let response = self
            .http_client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send search request")?;

        let results: SearchResponse = parse_json(response, "search").await?;
        Ok(results.tracks.items.into_iter().next())
    }

    /// Start playback of `uris`, or resume the current context when `None`.
    pub async fn start_playback(&self, uris: Option<&[String]>) -> Result<()> {
        let body = match uris {
            Some(uris) => json!({ "uris": uris }),
            None => json!({}),
        };

        let response = self
            .http_client
            .put(format!("{}/me/player/play", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send start_playback request")?;

        check_response_status(response).await.map(drop)
    }

    /// Pause the user's playback.
    pub async fn pause_playback(&self) -> Result<()> {
        let response = self
            .http_client
            .put(format!("{}/me/player/pause", self.base_url))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .context("Failed to send pause_playback request")?;

        check_response_status(response).await.map(drop)
    }

    /// Skip to the next track in the user's queue.
    pub async fn next_track(&self) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}/me/player/next", self.base_url))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .context("Failed to send next_track request")?;

        check_response_status(response).await.map(drop)
    }

    /// Current playback state. `None` when no device is active (204).
    pub async fn current_playback(&self) -> Result<Option<Playback>> {
        let response = self
            .http_client
            .get(format!("{}/me/player", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send current_playback request")?;

        let response = check_response_status(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let playback = response
            .json::<Playback>()
            .await
            .context("Failed to parse playback response")?;
        Ok(Some(playback))
    }

    /// All playlists owned or followed by the user.
    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let mut url = format!("{}/me/playlists?limit=50", self.base_url);
        let mut playlists = Vec::new();

        for _ in 0..MAX_PLAYLIST_PAGES {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .context("Failed to send playlists request")?;

            let page: Paging<Playlist> = parse_json(response, "playlists").await?;
            playlists.extend(page.items);
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(playlists)
    }

    /// Append tracks to a playlist. Returns the new snapshot id.
    pub async fn add_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<String> {
        #[derive(Deserialize)]
        struct Snapshot {
            snapshot_id: String,
        }

        let response = self
            .http_client
            .post(format!(
                "{}/playlists/{}/tracks",
                self.base_url,
                urlencoding::encode(playlist_id)
            ))
            .bearer_auth(&self.access_token)
            .json(&json!({ "uris": uris }))
            .send()
            .await
            .context("Failed to send add_to_playlist request")?;

        let snapshot: Snapshot = parse_json(response, "playlist snapshot").await?;
        Ok(snapshot.snapshot_id)
    }

    /// Most recently played tracks, newest first.
    pub async fn recently_played(&self, limit: u32) -> Result<Vec<PlayHistory>> {
        let response = self
            .http_client
            .get(format!("{}/me/player/recently-played", self.base_url))
            .query(&[("limit", limit.clamp(1, 50).to_string())])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send recently_played request")?;

        let page: Paging<PlayHistory> = parse_json(response, "recently played").await?;
        Ok(page.items)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    check_response_status(response)
        .await?
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {} response", what))
}

/// Spotify error envelope: `{"error": {"status": 404, "message": "..."}}`
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Check the response status and map known error codes to descriptive errors.
///
/// - 401 → token expired or invalid
/// - 404 with `NO_ACTIVE_DEVICE` → no device to control
/// - 429 → rate limited (reports Retry-After)
/// - Other non-2xx → Spotify's own message when present
async fn check_response_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body).ok().map(|e| e.error);

    match status {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Spotify auth error: access token expired or invalid")),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!(
            "Spotify rate limit exceeded (retry after {} seconds)",
            retry_after.unwrap_or(1)
        )),
        StatusCode::NOT_FOUND
            if detail.as_ref().and_then(|d| d.reason.as_deref()) == Some("NO_ACTIVE_DEVICE") =>
        {
            Err(anyhow!(
                "No active Spotify device found. Start Spotify on a device and try again."
            ))
        }
        _ => match detail {
            Some(detail) => Err(anyhow!("Spotify API error ({}): {}", status, detail.message)),
            None => Err(anyhow!("Spotify API error: {}", status)),
        },
    }
}
