//! Resilient request executor
//!
//! Wraps any resource API call with bearer-token injection, 401 detection,
//! a single transparent refresh cycle, and one retry. The retry bound is
//! structural: an explicit two-state loop (`First` → `Retried`) with no
//! transition out of `Retried`, so a provider that rejects every token can
//! cost at most two upstream calls and one refresh exchange per request.

use spotify_auth::Authenticator;
use token_store::TokenStore;
use tracing::{debug, warn};

use crate::error::{RequestError, Result};

/// Retry position of the in-flight call.
///
/// `Retried` is terminal: a 401 in that state is reported upstream rather
/// than triggering another refresh. One refresh per call handles the common
/// "access token expired mid-session" case without risking a retry storm
/// against a provider that is rejecting the refresh token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retried,
}

/// Client for the Spotify Web API with transparent token refresh.
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) auth: Authenticator,
    pub(crate) api_base: String,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, auth: Authenticator) -> Self {
        Self {
            http,
            auth,
            api_base: spotify_auth::API_BASE.into(),
        }
    }

    /// Point resource API calls at a different base URL (stub servers in
    /// tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Execute a resource API request on behalf of `handle`, refreshing the
    /// access token once if the first attempt comes back 401.
    ///
    /// The caller supplies the current access token (it has usually just
    /// read the record anyway to authenticate the inbound request). On the
    /// refresh path the record is re-fetched from the store so a refresh
    /// completed by a concurrent request is picked up rather than repeated.
    ///
    /// Returns the response body on a 200. Any other terminal status is
    /// reported as [`RequestError::Upstream`] with the body preserved for
    /// diagnostics.
    pub async fn execute(
        &self,
        store: &dyn TokenStore,
        handle: &str,
        access_token: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String> {
        let mut token = access_token.to_string();
        let mut attempt = Attempt::First;

        loop {
            let outbound = request
                .try_clone()
                .ok_or_else(|| RequestError::Http("request body is not cloneable".into()))?;

            let response = outbound
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| RequestError::Http(format!("sending request: {e}")))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| RequestError::Http(format!("reading response body: {e}")))?;

            if status == reqwest::StatusCode::OK {
                return Ok(body);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED && attempt == Attempt::First {
                debug!(handle, "access token rejected, attempting refresh");
                token = self.refresh_and_store(store, handle).await?;
                attempt = Attempt::Retried;
                continue;
            }

            metrics::counter!("relay_upstream_errors_total", "status" => status.as_u16().to_string())
                .increment(1);
            return Err(RequestError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
    }

    /// One refresh cycle: fetch the record, exchange the refresh token, and
    /// write the new access token back.
    ///
    /// Concurrent refreshes for the same handle are not serialized. Both
    /// callers store a freshly minted valid token, so the record converges
    /// either way; the cost is a redundant refresh exchange, which the
    /// metric below makes visible.
    async fn refresh_and_store(&self, store: &dyn TokenStore, handle: &str) -> Result<String> {
        let record = store.get(handle).await.ok_or(RequestError::InvalidToken)?;

        metrics::counter!("relay_token_refreshes_total").increment(1);
        let new_token = self
            .auth
            .refresh_access_token(&self.http, &record.refresh_token)
            .await
            .map_err(|e| {
                warn!(handle, error = %e, "refresh exchange failed");
                RequestError::RefreshFailed(e)
            })?;

        store
            .update_access_token(handle, new_token.clone())
            .await?;

        debug!(handle, "access token refreshed and stored");
        Ok(new_token)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use token_store::{BoxFuture, MemoryStore, TokenRecord};

    /// Store wrapper that counts access-token updates, for asserting the
    /// store's update path is hit exactly the expected number of times.
    pub(crate) struct CountingStore {
        pub inner: MemoryStore,
        pub updates: AtomicUsize,
    }

    impl CountingStore {
        pub fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                updates: AtomicUsize::new(0),
            }
        }
    }

    impl TokenStore for CountingStore {
        fn get<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, Option<TokenRecord>> {
            self.inner.get(handle)
        }

        fn contains<'a>(&'a self, handle: &'a str) -> BoxFuture<'a, bool> {
            self.inner.contains(handle)
        }

        fn insert<'a>(
            &'a self,
            handle: String,
            record: TokenRecord,
        ) -> BoxFuture<'a, token_store::Result<()>> {
            self.inner.insert(handle, record)
        }

        fn update_access_token<'a>(
            &'a self,
            handle: &'a str,
            access_token: String,
        ) -> BoxFuture<'a, token_store::Result<()>> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update_access_token(handle, access_token)
        }

        fn purge_older_than(&self, max_age: Duration) -> BoxFuture<'_, usize> {
            self.inner.purge_older_than(max_age)
        }

        fn len(&self) -> BoxFuture<'_, usize> {
            self.inner.len()
        }
    }

    /// Bind a stub resource API answering every path with the scripted
    /// status/body sequence (the last entry repeats once exhausted).
    /// Returns the base URL and a counter of calls received.
    pub(crate) async fn spawn_upstream(
        script: Vec<(StatusCode, &'static str)>,
    ) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);
        let app = Router::new().fallback({
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                let script = script.clone();
                async move {
                    let i = calls.fetch_add(1, Ordering::SeqCst);
                    script[i.min(script.len() - 1)]
                }
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    /// Bind a stub token endpoint that always answers with `body`.
    /// Returns the endpoint URL and a counter of refresh/exchange calls.
    pub(crate) async fn spawn_token_endpoint(
        status: StatusCode,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/api/token", {
            let calls = calls.clone();
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }
            })
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api/token"), calls)
    }

    pub(crate) fn test_client(api_base: &str, token_endpoint: &str) -> ApiClient {
        let auth = spotify_auth::Authenticator::new(
            "client-id",
            common::Secret::new("client-secret".into()),
            "http://localhost:8888/callback",
        )
        .with_token_endpoint(token_endpoint);
        ApiClient::new(reqwest::Client::new(), auth).with_api_base(api_base)
    }

    async fn seeded_store() -> CountingStore {
        let store = CountingStore::new();
        store
            .insert(
                "aabbccdd".into(),
                TokenRecord::new("AT1".into(), "RT1".into()),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn happy_path_never_touches_auth_or_update() {
        let (base, upstream_calls) =
            spawn_upstream(vec![(StatusCode::OK, r#"{"items":[]}"#)]).await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::OK, r#"{"access_token":"AT2"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = seeded_store().await;

        let body = client
            .execute(&store, "aabbccdd", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap();

        assert_eq!(body, r#"{"items":[]}"#);
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_then_succeed_updates_store_once() {
        let (base, upstream_calls) = spawn_upstream(vec![
            (StatusCode::UNAUTHORIZED, "expired"),
            (StatusCode::OK, "second-body"),
        ])
        .await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::OK, r#"{"access_token":"AT2"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = seeded_store().await;

        let body = client
            .execute(&store, "aabbccdd", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap();

        assert_eq!(body, "second-body");
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);

        let record = store.get("aabbccdd").await.unwrap();
        assert_eq!(record.access_token, "AT2", "new token must be persisted");
        assert_eq!(record.refresh_token, "RT1", "refresh token must not change");
    }

    #[tokio::test]
    async fn always_401_upstream_refreshes_exactly_once() {
        let (base, upstream_calls) =
            spawn_upstream(vec![(StatusCode::UNAUTHORIZED, "still expired")]).await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::OK, r#"{"access_token":"AT2"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = seeded_store().await;

        let err = client
            .execute(&store, "aabbccdd", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Upstream { status: 401, .. }));
        assert_eq!(
            upstream_calls.load(Ordering::SeqCst),
            2,
            "exactly one retry, never a second"
        );
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_terminal() {
        let (base, upstream_calls) =
            spawn_upstream(vec![(StatusCode::UNAUTHORIZED, "expired")]).await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_grant"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = seeded_store().await;

        let err = client
            .execute(&store, "aabbccdd", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::RefreshFailed(_)));
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        // The stale token must remain rather than being clobbered
        assert_eq!(store.get("aabbccdd").await.unwrap().access_token, "AT1");
    }

    #[tokio::test]
    async fn missing_record_on_refresh_path_is_invalid_token() {
        let (base, _) = spawn_upstream(vec![(StatusCode::UNAUTHORIZED, "expired")]).await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::OK, r#"{"access_token":"AT2"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = CountingStore::new(); // empty: handle was never stored

        let err = client
            .execute(&store, "ghost", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::InvalidToken));
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_401_failure_is_terminal_without_refresh() {
        let (base, upstream_calls) =
            spawn_upstream(vec![(StatusCode::INTERNAL_SERVER_ERROR, "boom")]).await;
        let (endpoint, refreshes) =
            spawn_token_endpoint(StatusCode::OK, r#"{"access_token":"AT2"}"#).await;
        let client = test_client(&base, &endpoint);
        let store = seeded_store().await;

        let err = client
            .execute(&store, "aabbccdd", "AT1", client.http.get(format!("{base}/me")))
            .await
            .unwrap_err();

        match err {
            RequestError::Upstream { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }
}
