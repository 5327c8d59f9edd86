use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::types::{Feed, FeedItem};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serializes the feed as an Atom 1.0 document.
///
/// Entry ids are `urn:sha256:<item id>`. The feed `updated` time is the newest
/// item timestamp, or now for a feed without items.
pub fn to_atom(feed: &Feed) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    writer
        .write_event(Event::Start(root))
        .context("Failed to write feed element")?;

    let channel = &feed.channel;
    let updated = feed
        .latest_timestamp()
        .map_or_else(|| rfc3339(Utc::now()), timestamp_rfc3339);

    text_element(&mut writer, "id", &channel.link)?;
    text_element(&mut writer, "title", &channel.feed_name())?;
    text_element(&mut writer, "updated", &updated)?;
    link_element(&mut writer, &channel.link)?;
    if let Some(description) = &channel.description {
        html_element(&mut writer, "subtitle", description.as_str())?;
    }
    if let Some(icon) = &channel.icon {
        text_element(&mut writer, "icon", icon)?;
    }

    for item in &feed.items {
        write_entry(&mut writer, item)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .context("Failed to write feed end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated Atom contains invalid UTF-8")
}

fn write_entry(writer: &mut XmlWriter, item: &FeedItem) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("entry")))
        .context("Failed to write entry element")?;

    text_element(writer, "id", &format!("urn:sha256:{}", item.id))?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "updated", &timestamp_rfc3339(item.timestamp))?;

    if let Some(author) = &item.author {
        writer
            .write_event(Event::Start(BytesStart::new("author")))
            .context("Failed to write author element")?;
        text_element(writer, "name", author)?;
        writer
            .write_event(Event::End(BytesEnd::new("author")))
            .context("Failed to write author end")?;
    }

    if let Some(uri) = &item.uri {
        link_element(writer, uri)?;
    }

    html_element(writer, "content", item.content.as_str())?;

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .context("Failed to write entry end")?;
    Ok(())
}

/// `<name>text</name>`, with `text` escaped.
fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {} element", name))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("Failed to write {} text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))?;
    Ok(())
}

/// `<name type="html">escaped markup</name>`.
fn html_element(writer: &mut XmlWriter, name: &str, html: &str) -> Result<()> {
    let mut start = BytesStart::new(name);
    start.push_attribute(("type", "html"));
    writer
        .write_event(Event::Start(start))
        .with_context(|| format!("Failed to write {} element", name))?;
    writer
        .write_event(Event::Text(BytesText::new(html)))
        .with_context(|| format!("Failed to write {} text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))?;
    Ok(())
}

fn link_element(writer: &mut XmlWriter, href: &str) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "alternate"));
    link.push_attribute(("type", "text/html"));
    link.push_attribute(("href", href));
    writer
        .write_event(Event::Empty(link))
        .context("Failed to write link element")?;
    Ok(())
}

fn timestamp_rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map_or_else(|| rfc3339(Utc::now()), rfc3339)
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{sanitize, ChannelMetadata};
    use pretty_assertions::assert_eq;

    fn item(id: &str, timestamp: i64, title: &str, content: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            timestamp,
            author: Some("Twitter Web App".to_string()),
            title: title.to_string(),
            content: sanitize(content),
            uri: Some(format!("https://twitter.com/i/web/status/{}", timestamp)),
        }
    }

    fn feed(items: Vec<FeedItem>) -> Feed {
        Feed {
            channel: ChannelMetadata {
                title: "Rust Language".to_string(),
                description: Some(sanitize("Systems & more")),
                icon: Some("https://pbs.twimg.com/profile.png".to_string()),
                link: "https://twitter.com/rustlang".to_string(),
            },
            items,
        }
    }

    #[test]
    fn test_atom_parses_with_entries_in_order() {
        let feed = feed(vec![
            item("bbb", 1539202764, "Newest", "<b>bold</b> text"),
            item("aaa", 1539100000, "Older", "a & b"),
        ]);
        let xml = to_atom(&feed).unwrap();

        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.feed_type, feed_rs::model::FeedType::Atom);
        assert_eq!(
            parsed.title.map(|t| t.content),
            Some("Rust Language - Twitter".to_string())
        );
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].id, "urn:sha256:bbb");
        assert_eq!(parsed.entries[1].id, "urn:sha256:aaa");
        assert_eq!(
            parsed.entries[0].title.as_ref().map(|t| t.content.as_str()),
            Some("Newest")
        );
        assert_eq!(
            parsed.entries[0].links.first().map(|l| l.href.as_str()),
            Some("https://twitter.com/i/web/status/1539202764")
        );
        assert_eq!(
            parsed.entries[0].authors.first().map(|a| a.name.as_str()),
            Some("Twitter Web App")
        );
        assert_eq!(
            parsed.updated.map(|t| t.timestamp()),
            Some(1539202764)
        );
    }

    #[test]
    fn test_content_is_escaped_html() {
        let xml = to_atom(&feed(vec![item("a", 0, "t", "<b>bold</b>")])).unwrap();
        assert!(xml.contains(r#"<content type="html">&lt;b&gt;bold&lt;/b&gt;</content>"#));
        assert!(xml.contains(r#"<subtitle type="html">Systems &amp;amp; more</subtitle>"#));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let mut entry = item("a", 0, "t", "x");
        entry.author = None;
        entry.uri = None;
        let mut feed = feed(vec![entry]);
        feed.channel.description = None;
        feed.channel.icon = None;

        let xml = to_atom(&feed).unwrap();
        assert!(!xml.contains("<author>"));
        assert!(!xml.contains("<subtitle"));
        assert!(!xml.contains("<icon>"));
        // Only the feed-level link remains
        assert_eq!(xml.matches("<link ").count(), 1);
    }

    #[test]
    fn test_timestamps_are_rfc3339() {
        assert_eq!(timestamp_rfc3339(1539202764), "2018-10-10T20:19:24Z");
    }
}
