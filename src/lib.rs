//! Builds a syndication feed from an account's timeline on the Twitter v1.1 API.
//!
//! The pipeline is: obtain an app-only bearer token ([`auth`]), fetch the
//! timeline ([`timeline`]), then normalize the records into a [`feed::Feed`]
//! that can be written as Atom or JSON.

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod storage;
pub mod timeline;
pub mod util;

pub use error::BridgeError;
