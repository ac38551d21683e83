//! In-memory store backend
//!
//! A mutex-guarded map. Suitable for tests and single-instance deployments
//! where losing sessions on restart is acceptable (users just log in
//! again). The mutex is held only for the duration of each map operation,
//! so concurrent requests against different handles do not contend beyond
//! the map access itself.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{TokenRecord, unix_now};
use crate::store::{BoxFuture, TokenStore};

/// Process-local credential map.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, TokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, Option<TokenRecord>> {
        Box::pin(async move { self.state.lock().await.get(handle).cloned() })
    }

    fn contains<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move { self.state.lock().await.contains_key(handle) })
    }

    fn insert<'a>(&'a self, handle: String, record: TokenRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(handle, "storing credential record");
            self.state.lock().await.insert(handle, record);
            Ok(())
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
            Ok(())
        })
    }

    fn purge_older_than(&self, max_age: Duration) -> BoxFuture<'_, usize> {
        Box::pin(async move {
            let cutoff = unix_now().saturating_sub(max_age.as_secs());
            let mut state = self.state.lock().await;
            let before = state.len();
            state.retain(|_, record| record.issued_at >= cutoff);
            before - state.len()
        })
    }

    fn len(&self) -> BoxFuture<'_, usize> {
        Box::pin(async move { self.state.lock().await.len() })
    }
}
