use anyhow::{Context, Result};

use super::types::Feed;

/// Serializes the feed as pretty-printed JSON (`channel` plus `items`).
pub fn to_json(feed: &Feed) -> Result<String> {
    serde_json::to_string_pretty(feed).context("Failed to serialize feed as JSON")
}
