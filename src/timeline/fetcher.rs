use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use thiserror::Error;

use super::record::RawTimelineRecord;
use crate::auth::BearerToken;
use crate::error::BridgeError;

/// Records requested per call; the API maximum for this endpoint is 200.
pub const TIMELINE_COUNT: u32 = 150;
const MAX_TIMELINE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and decoding a timeline.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was empty, JSON `null` or an empty array
    #[error("Empty response")]
    EmptyPayload,
    /// Body decoded to something other than a JSON array
    #[error("Expected a list of records, got {0}")]
    NotASequence(&'static str),
    /// Body was not valid JSON
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    /// Timeline URL could not be built
    #[error("Invalid timeline URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Which timeline to request.
#[derive(Debug, Clone, Copy)]
pub struct TimelineQuery<'a> {
    pub screen_name: &'a str,
    pub include_replies: bool,
    pub include_retweets: bool,
}

impl TimelineQuery<'_> {
    /// Query string parameters, in request order.
    fn params(&self) -> [(&'static str, String); 5] {
        [
            ("count", TIMELINE_COUNT.to_string()),
            ("tweet_mode", "extended".to_string()),
            ("screen_name", self.screen_name.trim().to_string()),
            ("exclude_replies", (!self.include_replies).to_string()),
            ("include_rts", self.include_retweets.to_string()),
        ]
    }
}

/// Records decoded from one timeline response.
#[derive(Debug, Default)]
pub struct TimelinePage {
    /// Records in provider order (newest first).
    pub records: Vec<RawTimelineRecord>,
    /// Array elements that did not decode as a record.
    pub skipped: usize,
}

/// Issues the authenticated `user_timeline` request.
pub struct TimelineFetcher<'a> {
    client: &'a reqwest::Client,
    timeline_url: String,
    timeout: Duration,
}

impl<'a> TimelineFetcher<'a> {
    pub fn new(client: &'a reqwest::Client, timeline_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            timeline_url: timeline_url.into(),
            timeout,
        }
    }

    /// Fetches up to [`TIMELINE_COUNT`] records for `query.screen_name`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::MissingScreenName`] - blank screen name; no request is sent
    /// - [`BridgeError::FetchFailure`] - network error, timeout, non-2xx status,
    ///   oversized, empty or non-array body
    ///
    /// An empty JSON array is not an error here; it yields an empty page.
    pub async fn fetch_timeline(
        &self,
        token: &BearerToken,
        query: &TimelineQuery<'_>,
    ) -> Result<TimelinePage, BridgeError> {
        if query.screen_name.trim().is_empty() {
            return Err(BridgeError::MissingScreenName);
        }

        let url = url::Url::parse_with_params(&self.timeline_url, query.params())
            .map_err(FetchError::from)?;

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .get(url.as_str())
                .header(AUTHORIZATION, token.authorization())
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()).into());
        }

        let bytes = read_limited_bytes(response, MAX_TIMELINE_SIZE).await?;
        let page = decode_timeline(&bytes)?;

        if page.skipped > 0 {
            tracing::warn!(
                screen_name = %query.screen_name,
                skipped = page.skipped,
                "Undecodable timeline records skipped"
            );
        }
        tracing::info!(
            screen_name = %query.screen_name,
            records = page.records.len(),
            "Fetched timeline"
        );

        Ok(page)
    }
}

/// Decodes a timeline body, skipping array elements that are not records.
///
/// An empty body, `null` or `[]` is [`FetchError::EmptyPayload`]. A non-empty
/// array whose elements are all skipped yields an empty page.
pub fn decode_timeline(bytes: &[u8]) -> Result<TimelinePage, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyPayload);
    }

    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let items = match value {
        serde_json::Value::Array(items) if items.is_empty() => {
            return Err(FetchError::EmptyPayload)
        }
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Err(FetchError::EmptyPayload),
        serde_json::Value::Object(_) => return Err(FetchError::NotASequence("an object")),
        serde_json::Value::String(_) => return Err(FetchError::NotASequence("a string")),
        serde_json::Value::Number(_) => return Err(FetchError::NotASequence("a number")),
        serde_json::Value::Bool(_) => return Err(FetchError::NotASequence("a boolean")),
    };

    let mut page = TimelinePage {
        records: Vec::with_capacity(items.len()),
        skipped: 0,
    };
    for item in items {
        match serde_json::from_value::<RawTimelineRecord>(item) {
            Ok(record) => page.records.push(record),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed timeline record");
                page.skipped += 1;
            }
        }
    }

    Ok(page)
}

/// Reads a response body, failing once it exceeds `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
