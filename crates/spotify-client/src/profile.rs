//! Profile reads against `/me`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use token_store::TokenStore;

use crate::client::ApiClient;
use crate::error::{RequestError, Result};

/// Subset of the Spotify profile the relay cares about, used for the
/// best-effort user registry. Spotify omits fields the token's scope does
/// not cover, so everything except `id` defaults to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub country: String,
}

impl ApiClient {
    /// Fetch the user's profile picture URL.
    ///
    /// Users without a picture get `None` — an empty `images` array or a
    /// missing field is a normal profile shape, not an error.
    pub async fn profile_picture(
        &self,
        store: &dyn TokenStore,
        handle: &str,
    ) -> Result<Option<String>> {
        let body = self.fetch_me(store, handle).await?;
        let profile: Value = serde_json::from_str(&body)
            .map_err(|e| RequestError::Malformed(format!("profile body: {e}")))?;

        let url = profile
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(|image| image.get("url"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(url)
    }

    /// Fetch the user's profile for registration.
    pub async fn me(&self, store: &dyn TokenStore, handle: &str) -> Result<UserProfile> {
        let body = self.fetch_me(store, handle).await?;
        serde_json::from_str(&body)
            .map_err(|e| RequestError::Malformed(format!("profile body: {e}")))
    }

    async fn fetch_me(&self, store: &dyn TokenStore, handle: &str) -> Result<String> {
        let record = store.get(handle).await.ok_or(RequestError::InvalidToken)?;
        let url = format!("{}/me", self.api_base);
        self.execute(store, handle, &record.access_token, self.http.get(&url))
            .await
    }
}
