//! Text normalization and the cheap lexical signals derived from it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid regex"));

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").expect("valid regex"));

/// Normalize post text for storage and scoring.
///
/// Decodes HTML entities, maps typographic quotes and dashes to ASCII, drops
/// zero-width characters, the BOM and control characters, and collapses runs
/// of whitespace. Other multi-byte characters, emoji included, pass through.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);

    let mut mapped = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => mapped.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => mapped.push('"'),
            '\u{2013}' | '\u{2212}' => mapped.push('-'),
            '\u{2014}' => mapped.push_str("--"),
            '\u{2026}' => mapped.push_str("..."),
            '\u{00A0}' | '\u{202F}' => mapped.push(' '),
            // Zero-width space, word joiner, BOM. ZWJ stays: emoji sequences need it.
            '\u{200B}' | '\u{2060}' | '\u{FEFF}' => {}
            c if c.is_control() && !c.is_whitespace() => {}
            c => mapped.push(c),
        }
    }

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hashtags without the `#`, in first-seen order.
///
/// Duplicates are detected case-insensitively; the first spelling wins.
#[must_use]
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[must_use]
pub fn count_mentions(text: &str) -> u32 {
    u32::try_from(MENTION_RE.find_iter(text).count()).unwrap_or(u32::MAX)
}

#[must_use]
pub fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities_and_collapses_whitespace() {
        assert_eq!(
            clean_text("  Fish &amp; chips\n\n&lt;3   today  "),
            "Fish & chips <3 today"
        );
    }

    #[test]
    fn maps_smart_punctuation_to_ascii() {
        assert_eq!(
            clean_text("\u{201C}It\u{2019}s fine\u{201D} \u{2014} really \u{2013} ok"),
            "\"It's fine\" -- really - ok"
        );
    }

    #[test]
    fn drops_zero_width_bom_and_controls() {
        assert_eq!(clean_text("\u{FEFF}he\u{200B}llo\u{0007} world"), "hello world");
        assert_eq!(clean_text("a&#x200B;b"), "ab");
    }

    #[test]
    fn keeps_emoji_and_accents() {
        assert_eq!(clean_text("café 😍 ❤\u{FE0F}"), "café 😍 ❤\u{FE0F}");
    }

    #[test]
    fn non_breaking_space_becomes_space() {
        assert_eq!(clean_text("a\u{00A0}\u{00A0}b"), "a b");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \t\n "), "");
    }

    #[test]
    fn hashtags_keep_case_and_first_seen_order() {
        assert_eq!(
            extract_hashtags("#Rust is great, #async too. #rust again #Tokio"),
            vec!["Rust", "async", "Tokio"]
        );
    }

    #[test]
    fn lone_hash_is_not_a_hashtag() {
        assert!(extract_hashtags("# heading and C#").is_empty());
    }

    #[test]
    fn mentions_and_words_are_counted() {
        let text = "thanks @ferris and @tokio_rs for the help";
        assert_eq!(count_mentions(text), 2);
        assert_eq!(count_words(text), 7);
        assert_eq!(count_words(""), 0);
    }
}
