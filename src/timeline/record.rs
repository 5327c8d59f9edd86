use serde::{Deserialize, Deserializer};

/// One timeline entry as returned by `statuses/user_timeline`.
///
/// Only `id` is required; a record without it fails to decode and is skipped
/// by the fetcher. Every other field is optional and JSON `null` is treated
/// the same as an absent field. Empty strings are kept as-is here; accessors
/// such as [`RawTimelineRecord::body`] treat them as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimelineRecord {
    pub id: u64,
    #[serde(default)]
    pub id_str: Option<String>,
    /// Provider timestamp, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Truncated text (compat mode).
    #[serde(default)]
    pub text: Option<String>,
    /// Untruncated text (extended mode).
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Entities,
    #[serde(default)]
    pub user: Option<UserProfile>,
    /// Posting client, usually an HTML anchor.
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<UrlEntity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<MediaEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlEntity {
    /// Shortened URL as it appears in the text.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntity {
    /// Shortened URL as it appears in the text.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub media_url_https: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub expanded_url: Option<String>,
    /// `photo`, `video` or `animated_gif`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_image_url_https: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

impl RawTimelineRecord {
    /// The record text: `full_text` when present, else `text`, else empty.
    pub fn body(&self) -> &str {
        non_empty(&self.full_text)
            .or_else(|| non_empty(&self.text))
            .unwrap_or("")
    }

    pub fn id_str(&self) -> Option<&str> {
        non_empty(&self.id_str)
    }

    pub fn source(&self) -> Option<&str> {
        non_empty(&self.source)
    }

    pub fn created_at(&self) -> Option<&str> {
        non_empty(&self.created_at)
    }
}

impl UserProfile {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    /// Profile image, preferring the https variant.
    pub fn image_url(&self) -> Option<&str> {
        non_empty(&self.profile_image_url_https).or_else(|| non_empty(&self.profile_image_url))
    }
}

/// Borrows the string when it is present and not empty.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
