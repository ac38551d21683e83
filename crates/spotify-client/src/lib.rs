//! Spotify Web API client with transparent token refresh
//!
//! The protocol core of the relay. Every resource API call goes through
//! [`ApiClient::execute`], which injects the bearer token, detects a 401,
//! performs exactly one refresh cycle (fetch record → refresh exchange →
//! store update), and retries once. A second 401 is terminal.
//!
//! On top of the executor sit the operations the relay exposes:
//! - [`complete_authorization`] — callback orchestration: code → token pair
//!   → stored record → opaque handle
//! - [`ApiClient::top_content`] — paginated top-artists/top-tracks
//!   aggregation
//! - [`ApiClient::profile_picture`] / [`ApiClient::me`] — profile reads

pub mod callback;
pub mod client;
pub mod error;
pub mod profile;
pub mod top;

pub use callback::complete_authorization;
pub use client::ApiClient;
pub use error::{RequestError, Result};
pub use profile::UserProfile;
pub use top::TopKind;
