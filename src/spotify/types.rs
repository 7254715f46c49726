use serde::Deserialize;

/// Spotify user profile (subset of GET /me).
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    /// Stable Spotify account id
    pub id: String,
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to the account id when the user has none.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Track artist.
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// Spotify track.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl Track {
    /// Name of the first credited artist.
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or("Unknown artist")
    }
}

/// Paged result envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Current playback state (subset of GET /me/player).
#[derive(Debug, Clone, Deserialize)]
pub struct Playback {
    pub is_playing: bool,
    /// Absent for episodes or while switching devices
    #[serde(default)]
    pub item: Option<Track>,
}

/// Track count reference inside a playlist object.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracks {
    pub total: u32,
}

/// Spotify playlist (simplified object).
#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tracks: Option<PlaylistTracks>,
}

/// Entry of the recently-played history.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: String,
}
