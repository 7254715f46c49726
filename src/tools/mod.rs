//! Tool dispatch surface.
//!
//! Every tool takes a session id plus its own arguments and always answers
//! with a sentence. Resolution failures and Spotify failures are rendered as
//! text here and never propagate further: the callers are conversational
//! agents relaying to a person.

use crate::error::SessionError;
use crate::session::SessionResolver;
use crate::spotify::SpotifyClient;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many history entries `get_recently_played` reports.
const RECENTLY_PLAYED_LIMIT: u32 = 10;

/// Name, description and argument list of a tool.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [&'static str],
}

const TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        name: "search_and_play",
        description: "Searches for a song and plays the first result.",
        arguments: &["session_id", "query"],
    },
    ToolDefinition {
        name: "pause_playback",
        description: "Pauses the current playback.",
        arguments: &["session_id"],
    },
    ToolDefinition {
        name: "resume_playback",
        description: "Resumes the current playback.",
        arguments: &["session_id"],
    },
    ToolDefinition {
        name: "next_track",
        description: "Skips to the next track.",
        arguments: &["session_id"],
    },
    ToolDefinition {
        name: "get_current_song",
        description: "Gets the currently playing song and artist.",
        arguments: &["session_id"],
    },
    ToolDefinition {
        name: "list_playlists",
        description: "Lists the user's playlists.",
        arguments: &["session_id"],
    },
    ToolDefinition {
        name: "add_song_to_playlist",
        description: "Searches for a song and adds the first result to the named playlist.",
        arguments: &["session_id", "song_query", "playlist_name"],
    },
    ToolDefinition {
        name: "get_recently_played",
        description: "Lists the most recently played tracks.",
        arguments: &["session_id"],
    },
];

/// All tools the dispatcher answers to.
pub fn tool_definitions() -> &'static [ToolDefinition] {
    TOOLS
}

/// Look up a tool by name.
pub fn find_tool(name: &str) -> Option<&'static ToolDefinition> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Stateless proxy from tool calls to the Spotify API.
#[derive(Clone)]
pub struct ToolDispatcher {
    resolver: Arc<SessionResolver>,
}

impl ToolDispatcher {
    pub fn new(resolver: Arc<SessionResolver>) -> Self {
        Self { resolver }
    }

    /// Route a call by tool name with JSON object arguments.
    pub async fn call(&self, name: &str, arguments: &Value) -> String {
        if find_tool(name).is_none() {
            return format!("Unknown tool '{}'.", name);
        }
        let session_id = match required_arg(arguments, "session_id") {
            Ok(id) => id,
            Err(msg) => return msg,
        };

        match name {
            "search_and_play" => match required_arg(arguments, "query") {
                Ok(query) => self.search_and_play(session_id, query).await,
                Err(msg) => msg,
            },
            "pause_playback" => self.pause_playback(session_id).await,
            "resume_playback" => self.resume_playback(session_id).await,
            "next_track" => self.next_track(session_id).await,
            "get_current_song" => self.get_current_song(session_id).await,
            "list_playlists" => self.list_playlists(session_id).await,
            "add_song_to_playlist" => {
                let song_query = match required_arg(arguments, "song_query") {
                    Ok(q) => q,
                    Err(msg) => return msg,
                };
                match required_arg(arguments, "playlist_name") {
                    Ok(playlist) => {
                        self.add_song_to_playlist(session_id, song_query, playlist)
                            .await
                    }
                    Err(msg) => msg,
                }
            }
            "get_recently_played" => self.get_recently_played(session_id).await,
            _ => format!("Unknown tool '{}'.", name),
        }
    }

    /// Searches for a song and plays the first result.
    pub async fn search_and_play(&self, session_id: &str, query: &str) -> String {
        let client = match self.client(session_id, "search_and_play").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(play_first_match(&client, query).await)
    }

    pub async fn pause_playback(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "pause_playback").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(
            client
                .pause_playback()
                .await
                .map(|_| "Playback paused.".to_string()),
        )
    }

    pub async fn resume_playback(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "resume_playback").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(
            client
                .start_playback(None)
                .await
                .map(|_| "Playback resumed.".to_string()),
        )
    }

    pub async fn next_track(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "next_track").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(
            client
                .next_track()
                .await
                .map(|_| "Skipped to the next track.".to_string()),
        )
    }

    pub async fn get_current_song(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "get_current_song").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(client.current_playback().await.map(|playback| {
            match playback {
                Some(playback) if playback.is_playing => match playback.item {
                    Some(track) => format!(
                        "Currently playing: {} by {}",
                        track.name,
                        track.primary_artist()
                    ),
                    None => "Nothing is currently playing.".to_string(),
                },
                _ => "Nothing is currently playing.".to_string(),
            }
        }))
    }

    pub async fn list_playlists(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "list_playlists").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(client.playlists().await.map(|playlists| {
            if playlists.is_empty() {
                return "You don't have any playlists.".to_string();
            }
            let lines: Vec<String> = playlists
                .iter()
                .map(|p| match &p.tracks {
                    Some(tracks) => format!("- {} ({} tracks)", p.name, tracks.total),
                    None => format!("- {}", p.name),
                })
                .collect();
            format!("Your playlists:\n{}", lines.join("\n"))
        }))
    }

    /// Searches for `song_query` and appends the first hit to the playlist
    /// whose name matches `playlist_name` (case-insensitive).
    pub async fn add_song_to_playlist(
        &self,
        session_id: &str,
        song_query: &str,
        playlist_name: &str,
    ) -> String {
        let client = match self.client(session_id, "add_song_to_playlist").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(add_first_match(&client, song_query, playlist_name).await)
    }

    pub async fn get_recently_played(&self, session_id: &str) -> String {
        let client = match self.client(session_id, "get_recently_played").await {
            Ok(client) => client,
            Err(msg) => return msg,
        };
        reply(
            client
                .recently_played(RECENTLY_PLAYED_LIMIT)
                .await
                .map(|history| {
                    if history.is_empty() {
                        return "No recently played tracks.".to_string();
                    }
                    let lines: Vec<String> = history
                        .iter()
                        .enumerate()
                        .map(|(i, entry)| {
                            format!(
                                "{}. {} by {}",
                                i + 1,
                                entry.track.name,
                                entry.track.primary_artist()
                            )
                        })
                        .collect();
                    format!("Recently played:\n{}", lines.join("\n"))
                }),
        )
    }

    async fn client(&self, session_id: &str, tool: &str) -> Result<SpotifyClient, String> {
        debug!(tool = tool, session_id = %session_id, "Tool call");
        self.resolver.resolve(session_id).await.map_err(|e| {
            if e.requires_reauthentication() {
                info!(tool = tool, session_id = %session_id, error = %e, "Session needs /login");
            } else {
                warn!(tool = tool, session_id = %session_id, error = %e, "Session resolution failed");
            }
            describe(&e)
        })
    }
}

async fn play_first_match(client: &SpotifyClient, query: &str) -> Result<String> {
    let Some(track) = client.search_track(query).await? else {
        return Ok(format!("No results found for '{}'.", query));
    };
    client.start_playback(Some(&[track.uri.clone()])).await?;
    Ok(format!(
        "Now playing: {} by {}",
        track.name,
        track.primary_artist()
    ))
}

async fn add_first_match(
    client: &SpotifyClient,
    song_query: &str,
    playlist_name: &str,
) -> Result<String> {
    let Some(track) = client.search_track(song_query).await? else {
        return Ok(format!("No results found for '{}'.", song_query));
    };

    let wanted = playlist_name.trim().to_lowercase();
    let playlists = client.playlists().await?;
    let Some(playlist) = playlists
        .iter()
        .find(|p| p.name.trim().to_lowercase() == wanted)
    else {
        return Ok(format!("Playlist '{}' not found.", playlist_name));
    };

    client
        .add_to_playlist(&playlist.id, &[track.uri.clone()])
        .await?;
    Ok(format!(
        "Added {} by {} to '{}'.",
        track.name,
        track.primary_artist(),
        playlist.name
    ))
}

fn reply(result: Result<String>) -> String {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Spotify call failed");
        describe(&SessionError::VendorApi(format!("{:#}", e)))
    })
}

/// Text shown to the caller for a failure.
fn describe(error: &SessionError) -> String {
    match error {
        SessionError::VendorApi(_) => format!("An error occurred: {}", error),
        _ => error.to_string(),
    }
}

fn required_arg<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, String> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("Missing required argument '{}'.", name))
}
