//! Keyed storage for Spotify credential pairs
//!
//! Maps opaque 32-character hex handles to access/refresh token records.
//! The handle is the only identifier the browser ever sees; the record
//! itself never crosses the trust boundary.
//!
//! Two interchangeable backends implement the [`TokenStore`] trait:
//! - [`MemoryStore`] — process-local map for tests and single-instance
//!   deployments
//! - [`FileStore`] — JSON file with atomic writes for deployments that must
//!   survive a restart
//!
//! Record lifecycle:
//! 1. Callback handler exchanges the authorization code for a token pair
//! 2. `generate_handle()` produces a collision-checked handle
//! 3. `insert()` stores the record with its creation timestamp
//! 4. Every authenticated request does a point `get()` by handle
//! 5. A 401-triggered refresh rewrites the access token via
//!    `update_access_token()` — the only field that ever changes
//! 6. An optional sweep task purges records past the retention age

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod store;
pub mod sweep;

pub use error::{Error, Result};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::TokenRecord;
pub use store::{BoxFuture, TokenStore, generate_handle};
pub use sweep::spawn_sweep_task;
