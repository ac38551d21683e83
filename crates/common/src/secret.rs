//! Redaction wrapper for credential material.
//!
//! Client secrets, access tokens, and refresh tokens all pass through log
//! statements at some point; wrapping them in `Secret` makes accidental
//! logging print `[REDACTED]` instead of the value, and zeroes the memory
//! on drop.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Log-safe preview: the last four characters, prefixed with an
    /// ellipsis. Enough to correlate a token across log lines without
    /// revealing it.
    pub fn preview(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{tail}")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("BQChgGJjW-access-token"));
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_value() {
        let secret = Secret::new(String::from("client-secret-value"));
        assert_eq!(secret.expose(), "client-secret-value");
    }

    #[test]
    fn preview_shows_only_tail() {
        let secret = Secret::new(String::from("AQDtokenvalue9xk2"));
        assert_eq!(secret.preview(), "…9xk2");
        assert!(!secret.preview().contains("AQDtoken"));
    }

    #[test]
    fn preview_of_short_value_is_harmless() {
        let secret = Secret::new(String::from("ab"));
        assert_eq!(secret.preview(), "…ab");
    }
}
