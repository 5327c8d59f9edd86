use crate::timeline::{non_empty, RawTimelineRecord};

/// Short URL → target mapping collected from a record's entities.
///
/// Keys keep their first insertion position; inserting an existing key
/// replaces its target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    entries: Vec<(String, String)>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mapping. Empty keys are ignored.
    pub fn insert(&mut self, short: impl Into<String>, target: impl Into<String>) {
        let short = short.into();
        if short.is_empty() {
            return;
        }
        let target = target.into();
        match self.entries.iter_mut().find(|(k, _)| *k == short) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((short, target)),
        }
    }

    pub fn get(&self, short: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == short)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces every short URL in `text` with its target.
    pub fn expand(&self, text: &str) -> String {
        self.substitute(text, |target| target)
    }

    /// Removes every short URL from `text`.
    pub fn elide(&self, text: &str) -> String {
        self.substitute(text, |_| "")
    }

    /// Single left-to-right pass. At each position the longest matching key
    /// wins; replaced text is never scanned again.
    fn substitute(&self, text: &str, replacement: impl Fn(&str) -> &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        let mut by_length: Vec<&(String, String)> = self.entries.iter().collect();
        by_length.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(ch) = rest.chars().next() {
            match by_length.iter().find(|(k, _)| rest.starts_with(k.as_str())) {
                Some((short, target)) => {
                    out.push_str(replacement(target.as_str()));
                    rest = &rest[short.len()..];
                }
                None => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        out
    }
}

/// Collects the record's short-URL mappings and picks its representative image.
///
/// URL entities map to their expanded URL. Media entities map to the media
/// file (https preferred), or to their expanded URL when no file is given.
/// The first `photo` or `video` entity with a media file supplies the image.
/// Entities missing a short URL or a target are skipped.
pub fn extract_links(record: &RawTimelineRecord) -> (LinkTable, Option<String>) {
    let mut links = LinkTable::new();
    let mut image = None;

    for entity in &record.entities.urls {
        if let (Some(short), Some(expanded)) = (non_empty(&entity.url), non_empty(&entity.expanded_url)) {
            links.insert(short, expanded);
        }
    }

    for media in &record.entities.media {
        let media_url = non_empty(&media.media_url_https).or_else(|| non_empty(&media.media_url));
        let short = non_empty(&media.url);

        match media_url {
            Some(media_url) => {
                if let Some(short) = short {
                    links.insert(short, media_url);
                }
                let is_visual = matches!(media.kind.as_deref(), Some("photo" | "video"));
                if image.is_none() && is_visual {
                    image = Some(media_url.to_string());
                }
            }
            None => {
                if let (Some(short), Some(expanded)) = (short, non_empty(&media.expanded_url)) {
                    links.insert(short, expanded);
                }
            }
        }
    }

    (links, image)
}
