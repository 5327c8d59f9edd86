use serde::Serialize;

use super::linkify::Html;

/// One feed entry built from a timeline record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    /// Lowercase hex SHA-256 of the record's decimal id.
    pub id: String,
    /// Creation time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Posting client, tags stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Never empty.
    pub title: String,
    pub content: Html,
    /// Status permalink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Account-level feed information, taken from the first record with a named user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMetadata {
    /// Account display name, or the screen name when no record names the user.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Html>,
    /// Profile image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Account permalink.
    pub link: String,
}

impl ChannelMetadata {
    /// Feed name shown by readers, e.g. `Rust Language - Twitter`.
    pub fn feed_name(&self) -> String {
        format!("{} - Twitter", self.title)
    }
}

/// The assembled feed handed to the writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub channel: ChannelMetadata,
    /// Items in timeline order (newest first).
    pub items: Vec<FeedItem>,
}

impl Feed {
    /// Timestamp of the newest item, if any.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.items.iter().map(|item| item.timestamp).max()
    }
}
