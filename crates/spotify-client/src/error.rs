//! Error taxonomy for relayed API calls
//!
//! Every failure on the authenticated request path maps to one of these
//! variants. The relay service translates them into HTTP statuses; raw
//! upstream bodies stay in the error for logging and never reach the
//! end user verbatim.

/// Errors from executing a relayed Spotify API call.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Handle not found in the store (or the store could not answer).
    /// The caller must re-authenticate; never retried.
    #[error("invalid or missing token")]
    InvalidToken,

    /// The refresh exchange itself failed — expired/revoked refresh token
    /// or provider outage. Terminal; re-authentication required.
    #[error("token refresh failed: {0}")]
    RefreshFailed(spotify_auth::Error),

    /// The authorization-code exchange failed during callback handling.
    #[error("token exchange failed: {0}")]
    Exchange(spotify_auth::Error),

    /// The store rejected a write. Internal failure, surfaced generically.
    #[error("token store error: {0}")]
    Store(#[from] token_store::Error),

    /// The resource API returned a non-success status (including a 401
    /// after the single refresh cycle). Body kept for diagnostics.
    #[error("upstream API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Transport-level failure talking to the resource API.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// 200 response whose body did not have the expected shape.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// Result alias for relayed API calls.
pub type Result<T> = std::result::Result<T, RequestError>;
