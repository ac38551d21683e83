//! Durable file-backed store
//!
//! Persists the handle → record map as a JSON file. All writes use atomic
//! temp-file + rename to prevent corruption on crash, and the file is kept
//! at 0600 since it contains live OAuth tokens. A tokio Mutex serializes
//! writers; the in-memory map is the source of truth between writes, so
//! reads never touch the disk on the request path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{TokenRecord, unix_now};
use crate::store::{BoxFuture, TokenStore};

/// Credential map mirrored to a JSON file.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, TokenRecord>>,
}

impl FileStore {
    /// Load records from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with zero
    /// sessions — every user simply logs in again).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading token file: {e}")))?;
            let records: HashMap<String, TokenRecord> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), records = records.len(), "loaded token store");
            records
        } else {
            info!(path = %path.display(), "token file not found, starting with empty store");
            let records = HashMap::new();
            // Create the empty file so future loads don't need the cold-start path
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl TokenStore for FileStore {
    fn get<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, Option<TokenRecord>> {
        Box::pin(async move { self.state.lock().await.get(handle).cloned() })
    }

    fn contains<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move { self.state.lock().await.contains_key(handle) })
    }

    fn insert<'a>(&'a self, handle: String, record: TokenRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(handle.clone(), record);
            debug!(handle, "stored credential record");
            write_atomic(&self.path, &state).await
        })
    }

    fn update_access_token<'a>(
        &'a self,
        handle: &'a str,
        access_token: String,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let record = state
                .get_mut(handle)
                .ok_or_else(|| Error::NotFound(handle.to_string()))?;
            record.access_token = access_token;
            debug!(handle, "access token updated");
            write_atomic(&self.path, &state).await
        })
    }

    fn purge_older_than(&self, max_age: Duration) -> BoxFuture<'_, usize> {
        Box::pin(async move {
            let cutoff = unix_now().saturating_sub(max_age.as_secs());
            let mut state = self.state.lock().await;
            let before = state.len();
            state.retain(|_, record| record.issued_at >= cutoff);
            let removed = before - state.len();
            if removed > 0 {
                if let Err(e) = write_atomic(&self.path, &state).await {
                    // Purge is best-effort; the stale entries are already
                    // gone from memory and the next write persists that.
                    warn!(error = %e, "failed to persist purge");
                }
            }
            removed
        })
    }

    fn len(&self) -> BoxFuture<'_, usize> {
        Box::pin(async move { self.state.lock().await.len() })
    }
}

/// Write the record map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains OAuth tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, TokenRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing token records: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("token file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp token file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token store");
    Ok(())
}
