// Configuration (environment + optional TOML tunables)
pub mod config;

// Session error type shared by the lifecycle components
pub mod error;

// Credential persistence (memory or SQLite)
pub mod credentials;

// Authorization server token endpoint client
pub mod oauth;

// Spotify Web API client
pub mod spotify;

// Session minting, refresh and resolution
pub mod session;

// Tool dispatch surface
pub mod tools;

// HTTP routers
pub mod api;
