//! HTTP surface of the relay
//!
//! Thin handlers over the `spotify-client` operations. Handlers return
//! typed errors; `ApiError` does the HTTP mapping. CORS is wide open by
//! design — the browser client is served from a different origin and
//! authenticates with the opaque `x-token-key` header, not cookies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, HeaderName, Method, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use spotify_client::{ApiClient, TopKind, complete_authorization};
use token_store::TokenStore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Instrument, info, info_span};

use crate::error::ApiError;
use crate::users::{self, UserRegistry};

/// Upper bound on `limit` for the top-content endpoints. The browser
/// client requests at most 99 (one 3×33 wall's worth); anything larger is
/// a caller bug, not a bigger wall.
const MAX_TOP_ITEMS: usize = 99;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ApiClient>,
    pub store: Arc<dyn TokenStore>,
    pub registry: Option<Arc<UserRegistry>>,
    pub frontend_url: String,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes, CORS, and request tracking.
///
/// Excess concurrent requests beyond `max_connections` are queued by the
/// limit layer, not rejected.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/top-artists", get(top_artists))
        .route("/top-tracks", get(top_tracks))
        .route("/profile", get(profile))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(middleware::from_fn(track_requests))
        .layer(cors_layer())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Browser-facing CORS policy: any origin, the methods the client uses,
/// and the custom token header.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-token-key"),
        ])
        .max_age(Duration::from_secs(86_400))
}

/// Per-request span with a request ID, plus duration/status metrics.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request.uri().path().to_string();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let started = Instant::now();

    let span = info_span!("request", %request_id, method = %request.method(), path = %route);
    let response = next.run(request).instrument(span).await;

    crate::metrics::record_request(
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Redirect the browser to Spotify's login page.
async fn login(State(state): State<AppState>) -> Redirect {
    let url = state.client.auth().authorize_url();
    info!("redirecting to authorization endpoint");
    Redirect::to(&url)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Spotify calls back here after the user authorizes. On success the
/// browser is sent back to the frontend with the opaque handle attached;
/// the tokens themselves never leave the relay.
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("authorization code is missing".into()))?;

    let handle = complete_authorization(&state.client, state.store.as_ref(), &code).await?;

    // Best-effort user registration; must never fail or delay the redirect
    if let Some(registry) = state.registry.clone() {
        let client = state.client.clone();
        let store = state.store.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            users::register(&client, store.as_ref(), &handle, &registry).await;
        });
    }

    let target = format!(
        "{}/?token_key={}",
        state.frontend_url.trim_end_matches('/'),
        handle
    );
    Ok(Redirect::to(&target))
}

#[derive(Debug, Deserialize)]
struct TopParams {
    limit: Option<String>,
}

async fn top_artists(
    state: State<AppState>,
    headers: HeaderMap,
    params: Query<TopParams>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    top_content(state, headers, params, TopKind::Artists).await
}

async fn top_tracks(
    state: State<AppState>,
    headers: HeaderMap,
    params: Query<TopParams>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    top_content(state, headers, params, TopKind::Tracks).await
}

async fn top_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TopParams>,
    kind: TopKind,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let handle = token_key(&headers)?;
    let total = match params.limit.as_deref() {
        None | Some("") => 50,
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_TOP_ITEMS).contains(n))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("limit must be 1-{MAX_TOP_ITEMS}, got: {raw}"))
            })?,
    };

    let items = state
        .client
        .top_content(state.store.as_ref(), handle, kind, total)
        .await?;
    Ok(Json(items))
}

/// The browser only ever needs the picture URL, so that is all we extract
/// and all we return. Users without a picture get an empty string per the
/// client contract.
async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handle = token_key(&headers)?;
    let url = state
        .client
        .profile_picture(state.store.as_ref(), handle)
        .await?;
    Ok(Json(serde_json::json!({
        "profilePictureUrl": url.unwrap_or_default()
    })))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stored = state.store.len().await;
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "stored_records": stored,
    }))
}

/// Prometheus metrics endpoint — text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn not_found() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "Wallify relay: page not found")
}

/// Extract the opaque handle from the `x-token-key` header.
fn token_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-token-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Request(spotify_client::RequestError::InvalidToken))
}
