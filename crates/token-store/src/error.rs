//! Error types for token store operations

/// Errors from token store writes.
///
/// Reads deliberately have no error channel: `get()` collapses both absence
/// and backend failure into `None`, because callers must treat the two
/// identically as "invalid or missing token".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("handle not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_handle() {
        let err = Error::NotFound("deadbeef".into());
        assert!(err.to_string().contains("deadbeef"));
    }

    #[test]
    fn debug_includes_variant_name() {
        let err = Error::Storage("disk full".into());
        let debug = format!("{err:?}");
        assert!(debug.contains("Storage"), "got: {debug}");
    }
}
