use std::borrow::Cow;

use super::entities;

/// Longest entity body (between `&` and `;`) we attempt to decode.
const MAX_ENTITY_LEN: usize = 32;

/// Escapes the five HTML-significant characters.
///
/// Single quotes become `&#039;` so the output is safe inside both single- and
/// double-quoted attribute values.
///
/// # Examples
///
/// ```
/// use tweetfeed::util::escape_html;
///
/// assert_eq!(escape_html(r#"<a href="x">Tom's</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom&#039;s&lt;/a&gt;");
/// ```
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decodes HTML character references in a single left-to-right pass.
///
/// Handles decimal (`&#39;`) and hexadecimal (`&#x27;`) references plus every
/// named entity of HTML 4.01 and `&apos;`. References must be
/// terminated by `;`; anything unrecognised is copied through verbatim.
/// Decoded text is never re-scanned, so `&amp;lt;` becomes `&lt;`.
///
/// Returns `Cow::Borrowed` when the input contains no `&`.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_reference(tail) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &tail[used..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Decodes the reference at the start of `tail` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(tail: &str) -> Option<(char, usize)> {
    let semi = tail
        .as_bytes()
        .iter()
        .take(MAX_ENTITY_LEN + 2)
        .position(|&b| b == b';')?;
    let body = &tail[1..semi];

    let ch = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
                u32::from_str_radix(hex, 16).ok()?
            }
            Some(_) => return None,
            None if !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()) => {
                num.parse::<u32>().ok()?
            }
            None => return None,
        };
        if code == 0 {
            return None;
        }
        char::from_u32(code)?
    } else {
        entities::lookup(body)?
    };

    Some((ch, semi + 1))
}

/// Removes HTML tags and comments, keeping the text between them.
///
/// A `<` followed by whitespace is literal text, not a tag. An unterminated
/// tag swallows the rest of the input. Quoted attribute values may contain `>`.
///
/// Returns `Cow::Borrowed` when the input contains no `<`.
pub fn strip_tags(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }

    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut copy_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1).is_some_and(|&b| is_space(b)) {
            i += 1;
            continue;
        }
        out.push_str(&s[copy_from..i]);
        i = skip_tag(bytes, i);
        copy_from = i;
    }
    out.push_str(&s[copy_from..]);

    Cow::Owned(out)
}

/// Returns the byte index just past the tag or comment starting at `start`.
fn skip_tag(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"<!--") {
        return bytes[start + 4..]
            .windows(3)
            .position(|w| w == b"-->")
            .map_or(bytes.len(), |end| start + 4 + end + 3);
    }

    let mut quote: Option<u8> = None;
    let mut j = start + 1;
    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return j + 1,
                _ => {}
            },
        }
        j += 1;
    }
    bytes.len()
}

/// Inserts `<br />` before every line break (`\r\n`, `\n\r`, `\n` or `\r`).
pub fn nl2br(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' | '\n' => {
                out.push_str("<br />");
                out.push(c);
                let pair = if c == '\r' { '\n' } else { '\r' };
                if let Some(next) = chars.next_if_eq(&pair) {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Trims ASCII space, tab, line breaks, NUL and vertical tab from both ends.
///
/// Narrower than [`str::trim`]: non-breaking and other Unicode spaces are kept.
pub fn trim_space(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0b'))
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}
