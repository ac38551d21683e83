//! The persisted credential record

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single user's Spotify credential pair.
///
/// Keyed by handle in the store, so the handle itself is not a field.
/// `issued_at` is unix epoch seconds at creation time and is advisory only:
/// access-token expiry is discovered reactively through a 401 from the
/// resource API, not by comparing timestamps. The sweep task is the sole
/// consumer of `issued_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRecord {
    /// Current bearer token for resource API calls; rewritten on refresh
    pub access_token: String,
    /// Long-lived token for minting new access tokens; never changes
    pub refresh_token: String,
    /// Creation time, unix epoch seconds
    pub issued_at: u64,
}

impl TokenRecord {
    /// Build a record stamped with the current time.
    pub fn new(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            issued_at: unix_now(),
        }
    }
}

/// Current unix time in seconds. Saturates to 0 before the epoch rather
/// than panicking on a badly skewed clock.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_stamped_with_now() {
        let before = unix_now();
        let record = TokenRecord::new("AT1".into(), "RT1".into());
        let after = unix_now();

        assert_eq!(record.access_token, "AT1");
        assert_eq!(record.refresh_token, "RT1");
        assert!(record.issued_at >= before && record.issued_at <= after);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let record = TokenRecord {
            access_token: "AT1".into(),
            refresh_token: "RT1".into(),
            issued_at: 1735500000,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TokenRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
