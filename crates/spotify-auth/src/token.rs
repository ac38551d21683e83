//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial OAuth flow completion)
//! 2. Token refresh (request-time refresh after a 401 from the resource API)
//!
//! Both operations POST form-encoded bodies to the accounts token endpoint
//! (`accounts.spotify.com`), authenticated with HTTP Basic client
//! credentials — not the resource API (`api.spotify.com`).
//!
//! Neither operation retries: each call counts against Spotify's rate
//! limits, and retry policy belongs to the request executor, not here.

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::constants::{AUTHORIZE_ENDPOINT, SCOPE, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// Raw token endpoint response for both exchange and refresh.
///
/// Spotify always returns `access_token`; `refresh_token` is present only
/// on the code-exchange response (the refresh flow does not rotate it).
/// Both fields stay optional here so the caller can report exactly which
/// one is missing.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Access/refresh pair produced by a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateless client for Spotify's accounts service.
///
/// Holds the static client credential pair and redirect URI from
/// configuration. The token endpoint is overridable so tests can point it
/// at a local stub.
pub struct Authenticator {
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    token_endpoint: String,
}

impl Authenticator {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            token_endpoint: TOKEN_ENDPOINT.into(),
        }
    }

    /// Point token requests at a different endpoint (stub servers in tests,
    /// or a corporate proxy in front of accounts.spotify.com).
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Build the authorization URL the browser is redirected to on `/login`.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
            AUTHORIZE_ENDPOINT,
            self.client_id,
            urlencoded(&self.redirect_uri),
            urlencoded(SCOPE),
        )
    }

    /// Exchange an authorization code for an access/refresh token pair.
    ///
    /// This is the second step of the login flow: the user has authorized
    /// in their browser and Spotify called back with the code. The redirect
    /// URI must match the one registered with the application or Spotify
    /// rejects the exchange.
    pub async fn exchange_code(&self, client: &reqwest::Client, code: &str) -> Result<TokenPair> {
        let response = client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

        let access_token = parsed
            .access_token
            .ok_or(Error::MissingField("access_token"))?;
        let refresh_token = parsed
            .refresh_token
            .ok_or(Error::MissingField("refresh_token"))?;

        debug!("authorization code exchanged for token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Spotify does not reissue the refresh token in this flow, so only the
    /// new access token is returned. A 401/403 from the token endpoint
    /// means the refresh token itself is revoked or invalid — the user has
    /// to re-authenticate from scratch.
    pub async fn refresh_access_token(
        &self,
        client: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<String> {
        let response = client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the refresh token is revoked or invalid
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }

            return Err(Error::TokenExchange(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

        let access_token = parsed
            .access_token
            .ok_or(Error::MissingField("access_token"))?;

        debug!("access token refreshed");
        Ok(access_token)
    }
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    fn test_authenticator(endpoint: &str) -> Authenticator {
        Authenticator::new(
            "client-id-123",
            Secret::new("client-secret-456".into()),
            "http://localhost:8888/callback",
        )
        .with_token_endpoint(endpoint)
    }

    /// Bind a stub token endpoint on an ephemeral port and return its URL.
    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/token")
    }

    #[test]
    fn authorize_url_contains_required_params() {
        let auth = test_authenticator(TOKEN_ENDPOINT);
        let url = auth.authorize_url();

        assert!(url.starts_with(AUTHORIZE_ENDPOINT));
        assert!(url.contains("client_id=client-id-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=user-top-read"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8888%2Fcallback"));
    }

    #[test]
    fn token_response_tolerates_missing_refresh() {
        let json = r#"{"access_token":"AT1","token_type":"Bearer","expires_in":3600}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("AT1"));
        assert!(parsed.refresh_token.is_none());
    }

    #[tokio::test]
    async fn exchange_code_returns_token_pair() {
        let endpoint = spawn_stub(Router::new().route(
            "/api/token",
            post(|| async { r#"{"access_token":"AT1","refresh_token":"RT1"}"# }),
        ))
        .await;

        let auth = test_authenticator(&endpoint);
        let pair = auth
            .exchange_code(&reqwest::Client::new(), "abc123")
            .await
            .unwrap();
        assert_eq!(pair.access_token, "AT1");
        assert_eq!(pair.refresh_token, "RT1");
    }

    #[tokio::test]
    async fn exchange_code_rejects_missing_refresh_token() {
        let endpoint = spawn_stub(Router::new().route(
            "/api/token",
            post(|| async { r#"{"access_token":"AT1"}"# }),
        ))
        .await;

        let auth = test_authenticator(&endpoint);
        let result = auth.exchange_code(&reqwest::Client::new(), "abc123").await;
        assert!(matches!(result, Err(Error::MissingField("refresh_token"))));
    }

    #[tokio::test]
    async fn exchange_code_surfaces_upstream_status_and_body() {
        let endpoint = spawn_stub(Router::new().route(
            "/api/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#,
                )
            }),
        ))
        .await;

        let auth = test_authenticator(&endpoint);
        let err = auth
            .exchange_code(&reqwest::Client::new(), "expired-code")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"), "got: {msg}");
        assert!(msg.contains("invalid_grant"), "got: {msg}");
    }

    #[tokio::test]
    async fn refresh_returns_new_access_token_only() {
        let endpoint = spawn_stub(Router::new().route(
            "/api/token",
            post(|| async { r#"{"access_token":"AT2","token_type":"Bearer","expires_in":3600}"# }),
        ))
        .await;

        let auth = test_authenticator(&endpoint);
        let token = auth
            .refresh_access_token(&reqwest::Client::new(), "RT1")
            .await
            .unwrap();
        assert_eq!(token, "AT2");
    }

    #[tokio::test]
    async fn refresh_classifies_rejected_token_as_invalid_credentials() {
        let endpoint = spawn_stub(Router::new().route(
            "/api/token",
            post(|| async { (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#) }),
        ))
        .await;

        let auth = test_authenticator(&endpoint);
        let result = auth
            .refresh_access_token(&reqwest::Client::new(), "rt_revoked")
            .await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn refresh_missing_access_token_is_an_error() {
        let endpoint = spawn_stub(
            Router::new().route("/api/token", post(|| async { r#"{"scope":"user-top-read"}"# })),
        )
        .await;

        let auth = test_authenticator(&endpoint);
        let result = auth
            .refresh_access_token(&reqwest::Client::new(), "RT1")
            .await;
        assert!(matches!(result, Err(Error::MissingField("access_token"))));
    }
}
