//! Spotify endpoint constants
//!
//! These identify Spotify's public OAuth and resource endpoints. The actual
//! secrets (client secret, access/refresh tokens) live in configuration and
//! the token store, never here.

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Authorization endpoint the browser is redirected to on login
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Base URL of the Spotify Web API
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// OAuth scope required for the top-artists/top-tracks endpoints.
/// Profile reads (`/me`) need no extra scope.
pub const SCOPE: &str = "user-top-read";
