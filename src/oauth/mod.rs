//! Client side of the Spotify authorization server.
//!
//! The authorization code flow as seen by this service:
//! 1. Browser hits GET /login → redirect to the consent URL
//! 2. User approves on Spotify
//! 3. Spotify redirects to /callback?code=...
//! 4. Code is exchanged for a token pair here
//! 5. Later, expired access tokens are refreshed here

mod exchange;

pub use exchange::{exchange_code, refresh_access_token};
