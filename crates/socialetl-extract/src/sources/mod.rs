//! The four platform extractors and helpers they share.

pub mod instagram;
pub mod reddit;
pub mod twitter;
pub mod youtube;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub use instagram::InstagramExtractor;
pub use reddit::RedditExtractor;
pub use twitter::TwitterExtractor;
pub use youtube::YoutubeExtractor;

/// Parse engagement counters as rendered by web UIs: `1,234`, `1.2K`, `3M`.
///
/// Returns `None` for text that is not a number at all.
#[must_use]
pub fn parse_metric_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last() {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((value * multiplier).round() as u64)
}

/// RFC 3339 timestamp as found in `datetime` attributes and API payloads.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Stable id for a post that exposes none: first 16 hex chars of the
/// SHA-256 of its text.
pub(crate) fn content_id(text: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_metric_text_plain_and_separated() {
        assert_eq!(parse_metric_text("42"), Some(42));
        assert_eq!(parse_metric_text("1,234"), Some(1_234));
    }

    #[test]
    fn parse_metric_text_suffixes() {
        assert_eq!(parse_metric_text("1.2K"), Some(1_200));
        assert_eq!(parse_metric_text("3M"), Some(3_000_000));
        assert_eq!(parse_metric_text("2.5k"), Some(2_500));
    }

    #[test]
    fn parse_metric_text_rejects_garbage() {
        assert_eq!(parse_metric_text(""), None);
        assert_eq!(parse_metric_text("Like"), None);
        assert_eq!(parse_metric_text("-5"), None);
    }

    #[test]
    fn content_id_is_stable_and_short() {
        let a = content_id("same text");
        assert_eq!(a, content_id("same text"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, content_id("other text"));
    }

    #[test]
    fn parse_timestamp_normalizes_to_utc() {
        let ts = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
