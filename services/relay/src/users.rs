//! Best-effort user registry
//!
//! After a successful callback the relay records who logged in, for usage
//! metrics. This runs on a spawned task, fire-and-forget with respect to
//! the token flow: a registry failure is logged and never rolls back or
//! fails the callback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use spotify_client::{ApiClient, UserProfile};
use thiserror::Error;
use token_store::TokenStore;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O error: {0}")]
    Io(String),

    #[error("registry parse error: {0}")]
    Parse(String),
}

/// JSON-file registry of Spotify profiles keyed by user ID.
/// Insert-if-absent: a returning user is logged, not rewritten.
pub struct UserRegistry {
    path: PathBuf,
    state: Mutex<HashMap<String, UserProfile>>,
}

impl UserRegistry {
    pub async fn load(path: PathBuf) -> Result<Self, RegistryError> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| RegistryError::Io(format!("reading user registry: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| RegistryError::Parse(format!("parsing user registry: {e}")))?
        } else {
            let empty = HashMap::new();
            write_atomic(&path, &empty).await?;
            empty
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Record a profile if its user ID is new. Returns whether it was new.
    pub async fn record(&self, profile: UserProfile) -> Result<bool, RegistryError> {
        let mut state = self.state.lock().await;
        if state.contains_key(&profile.id) {
            return Ok(false);
        }
        state.insert(profile.id.clone(), profile);
        write_atomic(&self.path, &state).await?;
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}

async fn write_atomic(
    path: &Path,
    data: &HashMap<String, UserProfile>,
) -> Result<(), RegistryError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| RegistryError::Parse(format!("serializing user registry: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| RegistryError::Io("registry path has no parent directory".into()))?;
    let tmp_path = dir.join(format!(".users.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| RegistryError::Io(format!("writing temp registry file: {e}")))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| RegistryError::Io(format!("renaming temp registry file: {e}")))?;
    Ok(())
}

/// Fetch the freshly authorized user's profile and record it.
///
/// Called from a spawned task after the callback redirect has already been
/// decided; every failure path here is log-only.
pub async fn register(
    client: &ApiClient,
    store: &dyn TokenStore,
    handle: &str,
    registry: &UserRegistry,
) {
    let profile = match client.me(store, handle).await {
        Ok(p) => p,
        Err(e) => {
            warn!(handle, error = %e, "user registration: profile fetch failed");
            return;
        }
    };

    let user_id = profile.id.clone();
    match registry.record(profile).await {
        Ok(true) => {
            metrics::counter!("relay_users_registered_total").increment(1);
            info!(user_id, "new user recorded");
        }
        Ok(false) => info!(user_id, "returning user"),
        Err(e) => warn!(user_id, error = %e, "user registration: registry write failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            display_name: format!("user-{id}"),
            email: format!("{id}@example.com"),
            country: "US".into(),
        }
    }

    #[tokio::test]
    async fn record_is_insert_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = UserRegistry::load(dir.path().join("users.json"))
            .await
            .unwrap();

        assert!(registry.record(profile("u1")).await.unwrap());
        assert!(!registry.record(profile("u1")).await.unwrap());
        assert!(registry.record(profile("u2")).await.unwrap());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn registry_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let registry = UserRegistry::load(path.clone()).await.unwrap();
        registry.record(profile("u1")).await.unwrap();

        let reloaded = UserRegistry::load(path).await.unwrap();
        assert_eq!(reloaded.len().await, 1);
        assert!(!reloaded.record(profile("u1")).await.unwrap());
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let registry = UserRegistry::load(path.clone()).await.unwrap();
        assert_eq!(registry.len().await, 0);
        assert!(path.exists());
    }
}
