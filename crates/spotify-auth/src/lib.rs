//! Spotify OAuth authentication library
//!
//! Performs the two token-endpoint interactions the relay needs:
//! authorization-code exchange and refresh-token exchange. This crate is a
//! standalone library with no dependency on the relay binary — it holds no
//! state beyond the configured client credentials and can be tested against
//! a local stub endpoint.
//!
//! Credential flow:
//! 1. Browser hits `/login` and is redirected to `Authenticator::authorize_url()`
//! 2. Spotify calls back with an authorization code
//! 3. Relay calls `Authenticator::exchange_code()` for the token pair
//! 4. Tokens are stored by `token-store` under an opaque handle
//! 5. On a 401 from the resource API, `Authenticator::refresh_access_token()`
//!    mints a replacement access token

pub mod constants;
pub mod error;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use token::{Authenticator, TokenPair};
