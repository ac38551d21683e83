//! Callback orchestration
//!
//! Glues the authenticator and the store together for the inbound
//! authorization callback: code → token pair → stored record → handle.
//! The handle is the only thing handed back to the browser.

use token_store::{TokenRecord, TokenStore, generate_handle};
use tracing::info;

use crate::client::ApiClient;
use crate::error::{RequestError, Result};

/// Complete the authorization flow for a callback code.
///
/// Exchanges the code, stores the resulting pair under a freshly generated
/// collision-checked handle, and returns the handle. Exchange failure is a
/// per-request error returned to the caller — one bad callback must never
/// take the service down.
pub async fn complete_authorization(
    client: &ApiClient,
    store: &dyn TokenStore,
    code: &str,
) -> Result<String> {
    let pair = client
        .auth
        .exchange_code(&client.http, code)
        .await
        .map_err(RequestError::Exchange)?;

    let handle = generate_handle(store).await;
    store
        .insert(
            handle.clone(),
            TokenRecord::new(pair.access_token, pair.refresh_token),
        )
        .await?;

    metrics::counter!("relay_tokens_issued_total").increment(1);
    info!(handle, "authorization complete, credential stored");
    Ok(handle)
}
