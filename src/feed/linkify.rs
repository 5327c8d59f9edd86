use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::util::{decode_entities, escape_html, nl2br, strip_tags, trim_space};

/// Candidate word separators: runs of ASCII whitespace or commas, or `<br>` markup.
static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\n\x0B\x0C\r ,]+|<br[ /]*>+").unwrap());

static URL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"://|[0-9a-zA-Z]{3,}\.[a-zA-Z]{2,3}").unwrap());

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\t\n\x0B\x0C\r ]+)#([0-9A-Za-z_]+)").unwrap());

/// Text that is safe to embed as HTML. Produced by [`Html::from_plain`],
/// [`sanitize`] or [`TextLinkifier::linkify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Html(String);

impl Html {
    /// Escapes text known to be plain and puts `<br />` before each line
    /// break. Unlike [`sanitize`] there is no already-HTML guard, so decoded
    /// `<` and `&` always come out escaped.
    pub fn from_plain(text: &str) -> Html {
        Html(nl2br(&escape_html(text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prepends an image block for `src`.
    pub fn with_image(self, src: &str) -> Html {
        Html(format!(r#"<p><img src="{}" /></p>{}"#, escape_html(src), self.0))
    }
}

impl fmt::Display for Html {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts text of unknown origin to HTML.
///
/// Text that already carries markup or character references (stripping tags
/// and decoding entities changes it) is returned as-is. Anything else is
/// escaped and gets `<br />` before each line break.
pub fn sanitize(raw: &str) -> Html {
    if decode_entities(&strip_tags(raw)) != raw {
        return Html(raw.to_string());
    }
    Html::from_plain(raw)
}

/// Turns bare URLs and hashtags in sanitized text into anchors.
#[derive(Debug, Clone)]
pub struct TextLinkifier {
    hashtag_base: String,
}

/// A claimed region of the input and the markup that replaces it.
struct Span {
    start: usize,
    end: usize,
    markup: String,
}

impl TextLinkifier {
    /// `hashtag_base` is prefixed to the tag name, e.g. `https://twitter.com/hashtag/`.
    pub fn new(hashtag_base: impl Into<String>) -> Self {
        Self {
            hashtag_base: hashtag_base.into(),
        }
    }

    /// [`Html::from_plain`] followed by [`TextLinkifier::linkify`].
    pub fn render(&self, plain: &str) -> Html {
        self.linkify(&Html::from_plain(plain))
    }

    /// Wraps URL-like words and hashtags in `<a target="_blank">` anchors.
    ///
    /// Words containing `@`, `[at]` or `(at)` are never linked, so
    /// obfuscated e-mail addresses stay as written.
    pub fn linkify(&self, html: &Html) -> Html {
        let text = html.as_str();
        let mut spans: Vec<Span> = Vec::new();

        for candidate in WORD_SEPARATOR.split(text) {
            let Some(word) = url_word(candidate) else {
                continue;
            };
            let Some(start) = first_unclaimed(text, &word, &spans) else {
                continue;
            };
            let href = if word.contains("://") {
                word.clone()
            } else {
                format!("http://{}", word)
            };
            spans.push(Span {
                start,
                end: start + word.len(),
                markup: format!(r#"<a href="{}" target="_blank">{}</a>"#, href, word),
            });
        }
        spans.sort_by_key(|span| span.start);

        let mut out = String::with_capacity(text.len() + spans.len() * 48);
        let mut pos = 0;
        for span in &spans {
            self.push_hashtags(&mut out, &text[pos..span.start], pos == 0);
            out.push_str(&span.markup);
            pos = span.end;
        }
        self.push_hashtags(&mut out, &text[pos..], pos == 0);

        Html(trim_space(&out).to_string())
    }

    /// Appends `gap` with hashtags linked. A `#` with no leading whitespace
    /// only counts when the gap starts the text.
    fn push_hashtags(&self, out: &mut String, gap: &str, at_start: bool) {
        let linked = HASHTAG.replace_all(gap, |caps: &Captures| {
            let whole = &caps[0];
            if !at_start && whole.starts_with('#') {
                return whole.to_string();
            }
            format!(
                r##" <a href="{}{}" target="_blank">#{}</a>"##,
                self.hashtag_base, &caps[1], &caps[1]
            )
        });
        out.push_str(&linked);
    }
}

/// Normalizes a candidate word and returns it (escaped) if it looks like a URL.
fn url_word(candidate: &str) -> Option<String> {
    if candidate.is_empty() {
        return None;
    }
    let decoded = decode_entities(candidate);
    let trimmed = decoded.trim_matches(is_edge_noise);
    if trimmed.is_empty() {
        return None;
    }
    let word = escape_html(trimmed);

    let obfuscated = word.contains('@') || word.contains("[at]") || word.contains("(at)");
    if obfuscated || !URL_LIKE.is_match(&word) {
        return None;
    }
    Some(word)
}

/// Characters stripped from both ends of a candidate word.
fn is_edge_noise(c: char) -> bool {
    matches!(c, '\\' | '\'' | '"' | '.') || c < ' ' || c >= '{'
}

/// First occurrence of `word` in `text` that sits on word boundaries and does
/// not overlap a claimed span. The boundary check keeps a bare domain from
/// matching inside a longer word such as a skipped e-mail address.
fn first_unclaimed(text: &str, word: &str, spans: &[Span]) -> Option<usize> {
    text.match_indices(word).map(|(start, _)| start).find(|&start| {
        let end = start + word.len();
        opens_word(text[..start].chars().next_back())
            && closes_word(text[end..].chars().next())
            && spans.iter().all(|span| end <= span.start || start >= span.end)
    })
}

/// Whether `prev` may come directly before a linked word.
fn opens_word(prev: Option<char>) -> bool {
    prev.is_none_or(|c| {
        c.is_ascii_whitespace() || matches!(c, ',' | '>' | ';') || is_edge_noise(c)
    })
}

/// Whether `next` may come directly after a linked word.
fn closes_word(next: Option<char>) -> bool {
    next.is_none_or(|c| {
        c.is_ascii_whitespace() || matches!(c, ',' | '<' | '&') || is_edge_noise(c)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const HASHTAG_BASE: &str = "https://twitter.com/hashtag/";

    fn linkifier() -> TextLinkifier {
        TextLinkifier::new(HASHTAG_BASE)
    }

    #[test]
    fn test_sanitize_escapes_plain_text() {
        assert_eq!(sanitize("a < b & c").as_str(), "a &lt; b &amp; c");
        assert_eq!(sanitize("line one\nline two").as_str(), "line one<br />\nline two");
        assert_eq!(sanitize("it's").as_str(), "it&#039;s");
    }

    #[test]
    fn test_sanitize_keeps_existing_markup() {
        let html = r#"<a href="https://example.com">link</a>"#;
        assert_eq!(sanitize(html).as_str(), html);
        assert_eq!(sanitize("fish &amp; chips").as_str(), "fish &amp; chips");
    }

    #[test]
    fn test_from_plain_always_escapes() {
        assert_eq!(
            Html::from_plain("I <3 Rust <script>alert(1)</script>").as_str(),
            "I &lt;3 Rust &lt;script&gt;alert(1)&lt;/script&gt;"
        );
        assert_eq!(Html::from_plain("fish &amp; chips").as_str(), "fish &amp;amp; chips");
        assert_eq!(Html::from_plain("a\nb").as_str(), "a<br />\nb");
    }

    #[test]
    fn test_render_escapes_markup_in_plain_text() {
        let html = linkifier().render("<b>hi</b> example.com");
        assert_eq!(
            html.as_str(),
            r#"&lt;b&gt;hi&lt;/b&gt; <a href="http://example.com" target="_blank">example.com</a>"#
        );
    }

    #[test]
    fn test_sanitize_plain_text_unchanged() {
        assert_eq!(sanitize("just words").as_str(), "just words");
    }

    #[test]
    fn test_linkify_url_with_scheme() {
        let html = linkifier().render("see https://example.com/page now");
        assert_eq!(
            html.as_str(),
            r#"see <a href="https://example.com/page" target="_blank">https://example.com/page</a> now"#
        );
    }

    #[test]
    fn test_linkify_adds_scheme() {
        let html = linkifier().render("visit example.com today");
        assert_eq!(
            html.as_str(),
            r#"visit <a href="http://example.com" target="_blank">example.com</a> today"#
        );
    }

    #[test]
    fn test_linkify_trims_punctuation() {
        let html = linkifier().render("Go to \"example.org\".");
        assert!(html
            .as_str()
            .contains(r#"<a href="http://example.org" target="_blank">example.org</a>"#));
    }

    #[test]
    fn test_linkify_hashtags() {
        let html = linkifier().render("#rust is fun #lang");
        assert_eq!(
            html.as_str(),
            concat!(
                r#"<a href="https://twitter.com/hashtag/rust" target="_blank">#rust</a>"#,
                r#" is fun "#,
                r#"<a href="https://twitter.com/hashtag/lang" target="_blank">#lang</a>"#
            )
        );
    }

    #[test]
    fn test_hashtag_needs_leading_space() {
        let html = linkifier().render("issue#42");
        assert_eq!(html.as_str(), "issue#42");
    }

    #[test]
    fn test_hashtag_directly_after_link_not_linked() {
        let html = linkifier().render("https://example.com#frag");
        assert!(!html.as_str().contains("hashtag/frag"));
    }

    #[test]
    fn test_url_and_hashtag_together() {
        let html = linkifier().render("Hello world https://example.com/page #bridge");
        assert!(html
            .as_str()
            .contains(r#"<a href="https://example.com/page" target="_blank">"#));
        assert!(html
            .as_str()
            .contains(r#"<a href="https://twitter.com/hashtag/bridge" target="_blank">#bridge</a>"#));
    }

    #[test]
    fn test_repeated_url_links_each_occurrence() {
        let html = linkifier().render("example.com and example.com");
        assert_eq!(html.as_str().matches("<a href=\"http://example.com\"").count(), 2);
    }

    #[test]
    fn test_obfuscated_addresses_not_linked() {
        for text in ["mail me@example.com", "me[at]example.com", "me(at)example.com"] {
            let html = linkifier().render(text);
            assert!(!html.as_str().contains("<a "), "linked: {}", html);
        }
    }

    #[test]
    fn test_domain_inside_skipped_address_not_linked() {
        let html = linkifier().render("mail foo@example.com or example.com");
        assert_eq!(
            html.as_str(),
            r#"mail foo@example.com or <a href="http://example.com" target="_blank">example.com</a>"#
        );
    }

    #[test]
    fn test_word_boundaries() {
        assert!(opens_word(None));
        assert!(opens_word(Some(' ')));
        assert!(opens_word(Some(';')));
        assert!(!opens_word(Some('@')));
        assert!(!opens_word(Some('x')));
        assert!(closes_word(None));
        assert!(closes_word(Some('<')));
        assert!(closes_word(Some('\u{2026}')));
        assert!(!closes_word(Some('m')));
        assert!(!closes_word(Some('/')));
    }

    #[test]
    fn test_linkify_splits_on_br() {
        let html = linkifier().render("example.com\nexample.org");
        assert!(html.as_str().contains(r#"href="http://example.com""#));
        assert!(html.as_str().contains(r#"href="http://example.org""#));
    }

    #[test]
    fn test_linkify_escaped_ampersand_in_url() {
        let html = linkifier().render("https://example.com/?a=1&b=2");
        assert_eq!(
            html.as_str(),
            r#"<a href="https://example.com/?a=1&amp;b=2" target="_blank">https://example.com/?a=1&amp;b=2</a>"#
        );
    }

    #[test]
    fn test_edge_noise() {
        assert!(is_edge_noise('.'));
        assert!(is_edge_noise('"'));
        assert!(is_edge_noise('\u{2026}'));
        assert!(is_edge_noise('}'));
        assert!(!is_edge_noise('/'));
        assert!(!is_edge_noise('a'));
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(s in "\\PC{0,64}") {
            let once = sanitize(&s);
            let twice = sanitize(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn sanitize_is_idempotent_on_markup_chars(s in "[a-z<>&;\"' \n#]{0,32}") {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(once.as_str()), once);
        }

        #[test]
        fn plain_text_never_carries_raw_markup(s in "\\PC{0,64}") {
            let html = linkifier().render(&s);
            let without_anchors = html
                .as_str()
                .replace(r#" target="_blank">"#, "")
                .replace("<a href=", "")
                .replace("</a>", "")
                .replace("<br />", "");
            prop_assert!(!without_anchors.contains('<'));
        }

        #[test]
        fn obfuscated_words_never_linked(
            user in "[a-z]{1,8}",
            sep in prop::sample::select(vec!["@", "[at]", "(at)"]),
            domain in "[a-z]{3,8}\\.com",
        ) {
            let text = format!("contact {}{}{}", user, sep, domain);
            let html = linkifier().render(&text);
            prop_assert!(!html.as_str().contains("<a "));
        }
    }
}
