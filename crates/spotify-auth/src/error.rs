//! Error types for OAuth authentication operations

/// Errors from OAuth authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token response missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_field() {
        let err = Error::MissingField("refresh_token");
        assert_eq!(err.to_string(), "token response missing field `refresh_token`");
    }

    #[test]
    fn display_carries_exchange_detail() {
        let err = Error::TokenExchange("token endpoint returned 400: bad code".into());
        assert!(err.to_string().contains("400"));
    }
}
