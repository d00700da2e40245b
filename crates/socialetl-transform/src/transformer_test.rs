use chrono::TimeZone;
use socialetl_core::{LexiconConfig, Platform};

use super::*;

fn raw(id: &str, text: &str, likes: Option<u64>, comments: Option<u64>) -> RawPost {
    let mut post = RawPost::new(Platform::Reddit, id, text);
    post.author = "someone".to_string();
    post.timestamp = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    post.likes = likes;
    post.comments = comments;
    post
}

fn pinned() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()
}

#[test]
fn enriches_every_field() {
    let t = Transformer::default();
    let post = t.transform_at(
        raw(
            "p1",
            "Loving the new release &amp; the docs! #Rust #rust #tokio thanks @ferris",
            Some(80),
            Some(30),
        ),
        pinned(),
    );

    assert_eq!(
        post.text,
        "Loving the new release & the docs! #Rust #rust #tokio thanks @ferris"
    );
    assert_eq!(post.hashtags, vec!["Rust", "tokio"]);
    assert_eq!(post.sentiment, SentimentLabel::Positive);
    assert_eq!(post.engagement, EngagementLevel::High);
    assert_eq!(post.word_count, 12);
    assert_eq!(post.mention_count, 1);
    assert_eq!(post.processed_at, pinned());
    assert_eq!(post.likes, Some(80));
}

#[test]
fn transform_is_deterministic_with_pinned_clock() {
    let t = Transformer::default();
    let input = raw("p1", "Great stuff 🎉 #launch", Some(3), None);
    assert_eq!(
        t.transform_at(input.clone(), pinned()),
        t.transform_at(input, pinned())
    );
}

#[test]
fn unknown_counts_stay_unknown() {
    let post = Transformer::default().transform_at(raw("p1", "hi", None, None), pinned());
    assert_eq!(post.likes, None);
    assert_eq!(post.comments, None);
    assert_eq!(post.engagement, EngagementLevel::Low);
}

#[test]
fn empty_text_gets_neutral_defaults() {
    let post = Transformer::default().transform_at(raw("p1", "", Some(1), Some(1)), pinned());
    assert_eq!(post.text, "");
    assert_eq!(post.sentiment, SentimentLabel::Neutral);
    assert_eq!(post.word_count, 0);
    assert!(post.hashtags.is_empty());
}

#[test]
fn configured_lexicon_replaces_default() {
    let scoring = ScoringConfig {
        lexicon: LexiconConfig {
            positive: vec!["shipped".to_string()],
            negative: vec!["love".to_string()],
        },
        ..ScoringConfig::default()
    };
    let t = Transformer::new(&scoring);
    let loved = t.transform_at(raw("a", "I love this", None, None), pinned());
    let shipped = t.transform_at(raw("b", "It shipped", None, None), pinned());
    assert_eq!(loved.sentiment, SentimentLabel::Negative);
    assert_eq!(shipped.sentiment, SentimentLabel::Positive);
}

#[test]
fn accept_counts_outcomes() {
    let t = Transformer::default();
    let mut stats = TransformStats::default();

    let inputs = vec![
        raw("1", "I love this!", Some(5), None),
        raw("2", "This is terrible", Some(50), None),
        raw("3", "It exists.", Some(500), None),
        raw("", "no id", None, None),
        {
            let mut undated = raw("5", "undated", None, None);
            undated.timestamp = None;
            undated
        },
    ];

    let accepted: Vec<EnrichedPost> = inputs
        .into_iter()
        .filter_map(|p| t.accept(p, &mut stats).ok())
        .collect();

    assert_eq!(accepted.len(), 3);
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.rejected_total(), 2);
    assert_eq!(stats.rejected.get(&Rejection::EmptyPostId), Some(&1));
    assert_eq!(stats.rejected.get(&Rejection::MissingTimestamp), Some(&1));
    assert_eq!(stats.sentiment.get(&SentimentLabel::Positive), Some(&1));
    assert_eq!(stats.sentiment.get(&SentimentLabel::Negative), Some(&1));
    assert_eq!(stats.sentiment.get(&SentimentLabel::Neutral), Some(&1));
    assert_eq!(stats.engagement.get(&EngagementLevel::Low), Some(&1));
    assert_eq!(stats.engagement.get(&EngagementLevel::Viral), None);
}

#[test]
fn stats_serialize_with_readable_keys() {
    let t = Transformer::default();
    let mut stats = TransformStats::default();
    let _ = t.accept(raw("", "x", None, None), &mut stats);
    let _ = t.accept(raw("1", "I love this!", None, None), &mut stats);

    let value = serde_json::to_value(&stats).unwrap();
    assert_eq!(value["rejected"]["empty_post_id"], 1);
    assert_eq!(value["sentiment"]["positive"], 1);
    assert_eq!(value["engagement"]["low"], 1);
}
