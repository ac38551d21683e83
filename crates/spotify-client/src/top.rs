//! Top-content aggregation
//!
//! Spotify caps `/me/top/{type}` at 50 items per request; the browser asks
//! for up to 99. This module pages through the upstream endpoint and hands
//! back one concatenated item array.

use serde_json::Value;
use token_store::TokenStore;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::{RequestError, Result};

/// Spotify's per-request item cap on the top-content endpoint.
const PAGE_LIMIT: usize = 50;

/// Which top-content listing to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopKind {
    Artists,
    Tracks,
}

impl TopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TopKind::Artists => "artists",
            TopKind::Tracks => "tracks",
        }
    }
}

impl ApiClient {
    /// Fetch up to `total` of the user's top artists or tracks, paging at
    /// 50 per upstream request and concatenating the `items` arrays.
    ///
    /// The current access token is re-read from the store before each page
    /// so that a refresh performed on an earlier page (or by a concurrent
    /// request) is used instead of triggering another 401 round trip.
    pub async fn top_content(
        &self,
        store: &dyn TokenStore,
        handle: &str,
        kind: TopKind,
        total: usize,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::with_capacity(total);
        let mut offset = 0;

        while offset < total {
            let page_limit = PAGE_LIMIT.min(total - offset);
            let record = store.get(handle).await.ok_or(RequestError::InvalidToken)?;

            let url = format!(
                "{}/me/top/{}?limit={}&offset={}",
                self.api_base,
                kind.as_str(),
                page_limit,
                offset
            );
            debug!(handle, url, "fetching top content page");

            let body = self
                .execute(store, handle, &record.access_token, self.http.get(&url))
                .await?;

            let page: Value = serde_json::from_str(&body)
                .map_err(|e| RequestError::Malformed(format!("top content page: {e}")))?;
            let page_items = page
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| RequestError::Malformed("missing `items` array".into()))?;

            items.extend(page_items.iter().cloned());
            offset += PAGE_LIMIT;
        }

        items.truncate(total);
        Ok(items)
    }
}
