use super::links::LinkTable;
use crate::util::trim_space;

/// Derives an entry title from tag-stripped record text.
///
/// Uses the first non-blank line with its short URLs removed. A trailing run
/// of hashtags is dropped unless the line consists of nothing else. Returns
/// an empty string when nothing is left; callers substitute the channel title.
pub fn derive_title(plain_text: &str, links: &LinkTable) -> String {
    let Some(line) = plain_text
        .split('\n')
        .map(trim_space)
        .find(|line| !line.is_empty())
    else {
        return String::new();
    };

    let elided = links.elide(line);
    let mut words: Vec<&str> = elided.split_ascii_whitespace().collect();

    let kept = words.len() - words.iter().rev().take_while(|w| is_hashtag(w)).count();
    if kept > 0 {
        words.truncate(kept);
    }

    words.join(" ")
}

fn is_hashtag(word: &str) -> bool {
    word.strip_prefix('#').is_some_and(|tag| {
        !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn links(pairs: &[(&str, &str)]) -> LinkTable {
        let mut table = LinkTable::new();
        for (short, target) in pairs {
            table.insert(*short, *target);
        }
        table
    }

    #[test]
    fn test_elides_urls_and_trailing_hashtags() {
        let table = links(&[("https://t.co/xyz", "https://example.com/page")]);
        assert_eq!(
            derive_title("Hello world https://t.co/xyz #bridge", &table),
            "Hello world"
        );
    }

    #[test]
    fn test_keeps_inline_hashtags() {
        assert_eq!(
            derive_title("Learning #rust today", &LinkTable::new()),
            "Learning #rust today"
        );
    }

    #[test]
    fn test_hashtag_only_line_is_kept() {
        assert_eq!(derive_title("#rust #lang", &LinkTable::new()), "#rust #lang");
    }

    #[test]
    fn test_first_non_blank_line() {
        assert_eq!(
            derive_title("\n  \nSecond line\nThird line", &LinkTable::new()),
            "Second line"
        );
    }

    #[test]
    fn test_collapses_gaps_left_by_elision() {
        let table = links(&[("https://t.co/a", "x"), ("https://t.co/b", "y")]);
        assert_eq!(
            derive_title("Read https://t.co/a and https://t.co/b here", &table),
            "Read and here"
        );
    }

    #[test]
    fn test_url_only_text_yields_empty() {
        let table = links(&[("https://t.co/a", "x")]);
        assert_eq!(derive_title("https://t.co/a", &table), "");
        assert_eq!(derive_title("", &LinkTable::new()), "");
    }

    #[test]
    fn test_hashtag_detection() {
        assert!(is_hashtag("#rust"));
        assert!(is_hashtag("#rust_2024"));
        assert!(!is_hashtag("#"));
        assert!(!is_hashtag("#rust!"));
        assert!(!is_hashtag("rust"));
    }
}
