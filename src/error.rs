use thiserror::Error;

use crate::timeline::FetchError;

/// Failures that abort building a feed.
///
/// Every variant is fatal to the invocation: nothing is retried and no partial
/// feed is produced. Per-record problems never surface here.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// API key or secret is absent or empty
    #[error("Missing credentials, please see configuration")]
    MissingCredentials,
    /// Screen name is absent or blank
    #[error("Please provide a screen name")]
    MissingScreenName,
    /// The client-credentials exchange did not yield a bearer token
    #[error("Unable to authenticate, please see configuration: {0}")]
    AuthFailure(String),
    /// The timeline request failed or returned something other than a record list
    #[error("Unable to fetch data: {0}")]
    FetchFailure(#[from] FetchError),
    /// The timeline decoded to zero records
    #[error("Timeline returned no records")]
    EmptyResult,
}
