//! Application-only authentication against the Twitter API.
//!
//! The API key and secret are exchanged for a bearer token through the OAuth2
//! client-credentials flow. The token is cached under a fixed scope and key
//! and reused by every later run until the cache entry is removed.

mod token;

pub use token::{BearerToken, Credentials, TokenManager, TOKEN_KEY, TOKEN_SCOPE};
