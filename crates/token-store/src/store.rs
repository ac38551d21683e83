//! Storage abstraction and handle generation
//!
//! Defines the `TokenStore` trait that decouples the request path from the
//! storage backend. The relay holds an `Arc<dyn TokenStore>` selected by
//! configuration, so the trait uses `Pin<Box<dyn Future>>` return types for
//! dyn-compatibility.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::RngExt;

use crate::error::Result;
use crate::record::TokenRecord;

/// Boxed future alias used by all trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over credential storage backends.
///
/// Concurrency contract: point reads and single-field updates to different
/// handles must not interfere. Concurrent refreshes against the *same*
/// handle are an accepted bounded race — both writers store *a* valid
/// access token, so the record converges either way.
pub trait TokenStore: Send + Sync {
    /// Point lookup by handle.
    ///
    /// Returns `None` both when the handle is absent and when the backend
    /// fails; callers treat either as "invalid or missing token" and answer
    /// with an authentication-required error. Backend failures are logged
    /// here, not distinguished upward.
    fn get<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, Option<TokenRecord>>;

    /// Existence probe used by the handle generation loop.
    fn contains<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, bool>;

    /// Unconditional insert. The handle was just proven unique by
    /// `generate_handle`, so no read-modify-write cycle is needed.
    fn insert<'a>(&'a self, handle: String, record: TokenRecord) -> BoxFuture<'a, Result<()>>;

    /// Rewrite exactly the access-token field of an existing record.
    /// `refresh_token` and `issued_at` must be untouched. Errors with
    /// `NotFound` if the handle does not exist.
    fn update_access_token<'a>(
        &'a self,
        handle: &'a str,
        access_token: String,
    ) -> BoxFuture<'a, Result<()>>;

    /// Remove records older than `max_age`, returning how many were purged.
    /// Called only by the sweep task, never from the request path.
    fn purge_older_than(&self, max_age: Duration) -> BoxFuture<'_, usize>;

    /// Number of live records, for health reporting.
    fn len(&self) -> BoxFuture<'_, usize>;
}

/// Generate a collision-free handle: 16 cryptographically random bytes,
/// lowercase hex (32 characters).
///
/// Uniqueness comes from the generate-and-check loop against the store, not
/// from the format. A collision at 128 bits is effectively unreachable, so
/// the loop almost always runs once; it exists so that uniqueness is a
/// checked property rather than a probabilistic assumption. OS randomness
/// failure aborts the process — there is no recoverable error path.
pub async fn generate_handle(store: &dyn TokenStore) -> String {
    loop {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        let candidate = hex_encode(&bytes);

        if !store.contains(&candidate).await {
            return candidate;
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
