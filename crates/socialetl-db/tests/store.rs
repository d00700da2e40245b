//! Store and query tests against a private in-memory SQLite database.

use chrono::{DateTime, TimeZone, Utc};
use socialetl_core::{
    EngagementLevel, EnrichedPost, ExtraFields, Platform, SentimentLabel,
};
use socialetl_db::{
    connect, open_in_memory, run_migrations, ExportFormat, GroupBy, Metric, PoolConfig,
    PostFilter, PostOrder, Store,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

fn post(platform: Platform, id: &str, text: &str) -> EnrichedPost {
    EnrichedPost {
        post_id: id.to_string(),
        platform,
        text: text.to_string(),
        author: "alice".to_string(),
        timestamp: Some(at(1, 12)),
        likes: Some(10),
        comments: Some(2),
        media_url: None,
        url: format!("https://example.com/{id}"),
        extra: ExtraFields::new(),
        hashtags: Vec::new(),
        sentiment: SentimentLabel::Neutral,
        engagement: EngagementLevel::Medium,
        word_count: 3,
        mention_count: 0,
        processed_at: at(2, 8),
    }
}

async fn store() -> Store {
    Store::new(open_in_memory().await.expect("in-memory database"))
}

#[tokio::test]
async fn loading_twice_inserts_once() {
    let store = store().await;
    let batch = vec![
        post(Platform::Reddit, "a", "one"),
        post(Platform::Reddit, "b", "two"),
        post(Platform::Twitter, "a", "same id, other platform"),
    ];

    assert_eq!(store.load(&batch).await.unwrap(), 3);
    assert_eq!(store.load(&batch).await.unwrap(), 0);
    assert_eq!(store.query().count(&PostFilter::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn duplicates_within_one_batch_are_skipped() {
    let store = store().await;
    let batch = vec![
        post(Platform::Reddit, "a", "first"),
        post(Platform::Reddit, "a", "second copy"),
    ];
    assert_eq!(store.load(&batch).await.unwrap(), 1);

    let rows = store.query().get(&PostFilter::default()).await.unwrap();
    assert_eq!(rows[0].post.text, "first");
}

#[tokio::test]
async fn blank_post_id_is_never_stored() {
    let store = store().await;
    let batch = vec![post(Platform::Reddit, "  ", "blank"), post(Platform::Reddit, "ok", "fine")];
    assert_eq!(store.load(&batch).await.unwrap(), 1);

    let rows = store.query().get(&PostFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].post.post_id, "ok");
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    assert_eq!(store().await.load(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn round_trips_every_field() {
    let store = store().await;
    let mut original = post(Platform::Youtube, "vid", "Learn #Rust today @ferris");
    original.hashtags = vec!["Rust".to_string()];
    original.mention_count = 1;
    original.comments = None;
    original.media_url = Some("https://i.ytimg.com/vi/vid/hqdefault.jpg".to_string());
    original.extra.insert("view_count".to_string(), 1500.into());
    original.sentiment = SentimentLabel::Positive;
    original.engagement = EngagementLevel::Viral;
    store.load(std::slice::from_ref(&original)).await.unwrap();

    let rows = store.query().get(&PostFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].id > 0);
    assert_eq!(rows[0].post, original);
}

#[tokio::test]
async fn newest_scrape_comes_first() {
    let store = store().await;
    store.load(&[post(Platform::Reddit, "old", "x")]).await.unwrap();
    store
        .load(&[post(Platform::Reddit, "mid", "x"), post(Platform::Reddit, "new", "x")])
        .await
        .unwrap();

    let rows = store
        .query()
        .get(&PostFilter::platform(Platform::Reddit).with_limit(10))
        .await
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.post.post_id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
    assert!(rows[0].scraped_at >= rows[2].scraped_at);
}

#[tokio::test]
async fn filters_limit_offset_and_order() {
    let store = store().await;
    let mut batch = Vec::new();
    for (i, likes) in [5u64, 50, 500].into_iter().enumerate() {
        let mut p = post(Platform::Reddit, &format!("r{i}"), "text");
        p.likes = Some(likes);
        p.author = if i == 0 { "bob".into() } else { "alice".into() };
        batch.push(p);
    }
    let mut tweet = post(Platform::Twitter, "t1", "text");
    tweet.sentiment = SentimentLabel::Negative;
    batch.push(tweet);
    store.load(&batch).await.unwrap();
    let query = store.query();

    let by_likes = query
        .get(&PostFilter {
            platform: Some(Platform::Reddit),
            order: PostOrder::Likes,
            ..PostFilter::default()
        })
        .await
        .unwrap();
    let likes: Vec<Option<u64>> = by_likes.iter().map(|r| r.post.likes).collect();
    assert_eq!(likes, vec![Some(500), Some(50), Some(5)]);

    let page = query
        .get(&PostFilter {
            platform: Some(Platform::Reddit),
            order: PostOrder::Likes,
            limit: Some(1),
            offset: 1,
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].post.likes, Some(50));

    let bobs = query
        .get(&PostFilter {
            author: Some("bob".into()),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(bobs.len(), 1);

    let negative = query
        .get(&PostFilter {
            sentiment: Some(SentimentLabel::Negative),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(negative.len(), 1);
    assert_eq!(negative[0].post.platform, Platform::Twitter);
}

#[tokio::test]
async fn search_ranks_by_occurrences_then_likes() {
    let store = store().await;
    let mut once_popular = post(Platform::Reddit, "a", "Rust is nice");
    once_popular.likes = Some(900);
    let mut twice = post(Platform::Reddit, "b", "rust rust everywhere");
    twice.likes = Some(1);
    let mut once_quiet = post(Platform::Reddit, "c", "I like RUST");
    once_quiet.likes = Some(3);
    let unrelated = post(Platform::Reddit, "d", "Go is fine");
    store
        .load(&[once_popular, twice, once_quiet, unrelated])
        .await
        .unwrap();

    let hits = store.query().search("Rust", 10).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|r| r.post.post_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);

    assert!(store.query().search("   ", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_folds_non_ascii_case() {
    let store = store().await;
    store
        .load(&[
            post(Platform::Reddit, "a", "Café ÉCOLE review"),
            post(Platform::Reddit, "b", "plain ascii"),
        ])
        .await
        .unwrap();

    for needle in ["CAFÉ", "école", "REVIEW"] {
        let hits = store.query().search(needle, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.post.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a"], "searching {needle:?}");
    }
    let hits = store.query().search("ÉCOLE", 10).await.unwrap();
    assert_eq!(hits[0].post.text, "Café ÉCOLE review", "stored text keeps its case");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loads_of_one_batch_insert_each_key_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("posts.db").display());
    let pool = connect(&url, PoolConfig::default()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Store::new(pool.clone());

    let batch: Vec<EnrichedPost> = (0..300)
        .map(|i| post(Platform::Twitter, &i.to_string(), "same batch"))
        .collect();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let batch = batch.clone();
        handles.push(tokio::spawn(async move { store.load(&batch).await }));
    }

    let mut inserted = 0;
    for handle in handles {
        inserted += handle.await.unwrap().unwrap();
    }
    assert_eq!(inserted, 300);
    assert_eq!(store.query().stats().await.unwrap().total, 300);

    pool.close().await;
}

#[tokio::test]
async fn aggregates_by_group_and_metric() {
    let store = store().await;
    let mut a = post(Platform::Reddit, "a", "x");
    a.likes = Some(10);
    let mut b = post(Platform::Reddit, "b", "x");
    b.likes = Some(30);
    let mut c = post(Platform::Twitter, "c", "x");
    c.likes = None;
    c.timestamp = Some(at(3, 9));
    store.load(&[a, b, c]).await.unwrap();
    let query = store.query();

    let counts = query.aggregate(GroupBy::Platform, Metric::Count).await.unwrap();
    assert_eq!(counts[0].key, "reddit");
    assert!((counts[0].value - 2.0).abs() < f64::EPSILON);

    let avg = query.aggregate(GroupBy::Platform, Metric::AvgLikes).await.unwrap();
    let reddit = avg.iter().find(|r| r.key == "reddit").unwrap();
    assert!((reddit.value - 20.0).abs() < f64::EPSILON);
    let twitter = avg.iter().find(|r| r.key == "twitter").unwrap();
    assert!(twitter.value.abs() < f64::EPSILON, "unknown likes average to 0");

    let days = query.aggregate(GroupBy::Day, Metric::Count).await.unwrap();
    let keys: Vec<&str> = days.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["2024-06-01", "2024-06-03"]);
}

#[tokio::test]
async fn stats_summarize_the_table() {
    let store = store().await;
    let mut a = post(Platform::Reddit, "a", "x");
    a.hashtags = vec!["Rust".into(), "async".into()];
    a.sentiment = SentimentLabel::Positive;
    let mut b = post(Platform::Reddit, "b", "x");
    b.hashtags = vec!["rust".into()];
    b.author = "[deleted]".into();
    b.timestamp = Some(at(5, 0));
    let mut c = post(Platform::Instagram, "c", "x");
    c.author = "carol".into();
    store.load(&[a, b, c]).await.unwrap();
    let query = store.query();

    let stats = query.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_platform[0], ("reddit".to_string(), 2));
    assert!(stats.top_authors.iter().all(|(name, _)| name != "[deleted]"));
    assert_eq!(stats.top_hashtags[0].1, 2, "case variants count together");
    assert_eq!(stats.earliest, Some(at(1, 12)));
    assert_eq!(stats.latest, Some(at(5, 0)));

    let shares = query.sentiment_distribution(Some(Platform::Reddit)).await.unwrap();
    let positive = shares
        .iter()
        .find(|s| s.label == SentimentLabel::Positive)
        .unwrap();
    assert_eq!(positive.count, 1);
    assert!((positive.percent - 50.0).abs() < f64::EPSILON);
    let negative = shares
        .iter()
        .find(|s| s.label == SentimentLabel::Negative)
        .unwrap();
    assert_eq!(negative.count, 0);
}

#[tokio::test]
async fn end_to_end_sentences_list_newest_first() {
    let store = store().await;
    let mut loved = post(Platform::Reddit, "1", "I love this!");
    loved.sentiment = SentimentLabel::Positive;
    let mut hated = post(Platform::Reddit, "2", "This is terrible");
    hated.sentiment = SentimentLabel::Negative;
    let plain = post(Platform::Reddit, "3", "It exists.");
    store.load(&[loved, hated, plain]).await.unwrap();

    let rows = store
        .query()
        .get(&PostFilter::platform(Platform::Reddit).with_limit(10))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.windows(2).all(|w| w[0].scraped_at >= w[1].scraped_at && w[0].id > w[1].id));
}

#[tokio::test]
async fn exports_csv_and_columnar_atomically() {
    let store = store().await;
    let mut quoted = post(Platform::Reddit, "a", "hello, \"world\"");
    quoted.hashtags = vec!["one".into(), "two".into()];
    store
        .load(&[quoted, post(Platform::Twitter, "b", "tweet")])
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let query = store.query();

    let csv_path = dir.path().join("nested").join("reddit.csv");
    let rows = query
        .export(ExportFormat::Csv, &PostFilter::platform(Platform::Reddit), &csv_path)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,post_id,platform,post_text"));
    let row = lines.next().unwrap();
    assert!(row.contains("\"hello, \"\"world\"\"\""));
    assert!(row.contains("\"one,two\""));
    assert!(lines.next().is_none());

    let json_path = dir.path().join("all.json");
    let rows = query
        .export(ExportFormat::Columnar, &PostFilter::default(), &json_path)
        .await
        .unwrap();
    assert_eq!(rows, 2);
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(doc["row_count"], 2);
    assert_eq!(doc["columns"][1]["name"], "post_id");
    assert_eq!(doc["columns"][1]["values"].as_array().unwrap().len(), 2);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("all.json")]);
}
