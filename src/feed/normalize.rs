use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::linkify::TextLinkifier;
use super::links::LinkTable;
use super::title::derive_title;
use super::types::FeedItem;
use crate::config::Endpoints;
use crate::timeline::RawTimelineRecord;
use crate::util::{decode_entities, strip_tags, trim_space};

/// Timestamp layout used by the v1.1 API, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const PROVIDER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Turns raw records into feed items.
pub struct EntryNormalizer<'a> {
    endpoints: &'a Endpoints,
    linkifier: TextLinkifier,
}

impl<'a> EntryNormalizer<'a> {
    pub fn new(endpoints: &'a Endpoints) -> Self {
        Self {
            endpoints,
            linkifier: TextLinkifier::new(endpoints.hashtag_base()),
        }
    }

    pub fn linkifier(&self) -> &TextLinkifier {
        &self.linkifier
    }

    /// Builds the feed item for `record`. Never fails: missing or malformed
    /// fields fall back to defaults. `fallback_title` is used when the text
    /// yields no title.
    pub fn normalize(
        &self,
        record: &RawTimelineRecord,
        links: &LinkTable,
        image: Option<&str>,
        fallback_title: &str,
    ) -> FeedItem {
        let text = decode_entities(record.body());

        let mut title = derive_title(&strip_tags(&text), links);
        if title.is_empty() {
            title = fallback_title.to_string();
        }

        let author = record
            .source()
            .map(|source| trim_space(&decode_entities(&strip_tags(source))).to_string())
            .filter(|author| !author.is_empty());

        let mut content = self.linkifier.render(&links.expand(&text));
        if let Some(image) = image {
            content = content.with_image(image);
        }

        FeedItem {
            id: item_id(record.id),
            timestamp: parse_timestamp(record.id, record.created_at()),
            author,
            title,
            content,
            uri: record.id_str().map(|id| self.endpoints.status_link(id)),
        }
    }
}

/// Stable item id: lowercase hex SHA-256 of the decimal record id.
pub fn item_id(id: u64) -> String {
    let digest = Sha256::digest(id.to_string().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parses a record timestamp, falling back to the current time.
fn parse_timestamp(id: u64, created_at: Option<&str>) -> i64 {
    let Some(raw) = created_at else {
        tracing::debug!(id, "Record has no creation time, using now");
        return Utc::now().timestamp();
    };

    match parse_created_at(raw) {
        Some(time) => time.timestamp(),
        None => {
            tracing::warn!(id, created_at = %raw, "Unparsable creation time, using now");
            Utc::now().timestamp()
        }
    }
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, PROVIDER_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|time| time.with_timezone(&Utc))
}
