// tests/providers_feed.rs
use std::fs;

use news_aggregator::config::FeedSettings;
use news_aggregator::ingest::error::SourceError;
use news_aggregator::ingest::providers::feed::FeedProvider;
use news_aggregator::ingest::types::SourceProvider;
use news_aggregator::ItemSource;

#[tokio::test]
async fn reads_wrapped_items_and_caps_count() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("rss.json");
    fs::write(
        &p,
        r#"{"items": [
            {"title": "A", "link": "https://a.example", "published": "2025-09-01T10:00:00Z", "description": "<p>alpha</p>"},
            {"title": "B", "link": "https://b.example", "pubDate": "Mon, 01 Sep 2025 12:00:00 +0200", "content": "beta"},
            {"title": "C", "link": "https://c.example"},
            {"title": "D", "link": "https://d.example"}
        ]}"#,
    )
    .unwrap();

    let provider = FeedProvider::from_path(&p, 3);
    let items = provider.fetch_latest("ignored topic").await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "A");
    assert_eq!(items[0].content, "alpha");
    assert_eq!(items[0].published, "2025-09-01T10:00:00Z");
    assert_eq!(items[1].published, "2025-09-01T10:00:00Z");
    assert_eq!(items[1].content, "beta");
    assert!(items.iter().all(|i| i.source == ItemSource::Feed && i.scout_id.is_none()));
}

#[tokio::test]
async fn reads_bare_array() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("rss.json");
    fs::write(&p, r#"[{"name": "Only", "url": "https://o.example"}]"#).unwrap();

    let items = FeedProvider::from_path(&p, 3).read(3).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Only");
    assert_eq!(items[0].url, "https://o.example");
    assert!(chrono::DateTime::parse_from_rfc3339(&items[0].published).is_ok());
}

#[tokio::test]
async fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FeedProvider::from_path(dir.path().join("nope.json"), 3);
    let err = provider.read(3).await.unwrap_err();
    assert!(matches!(err, SourceError::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn unset_path_and_empty_list_are_config_errors() {
    let unset = FeedProvider::new(&FeedSettings::default());
    assert!(matches!(unset.read(3).await, Err(SourceError::Config(_))));

    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("rss.json");
    fs::write(&p, r#"{"items": []}"#).unwrap();
    let empty = FeedProvider::from_path(&p, 3);
    assert!(matches!(empty.read(3).await, Err(SourceError::Config(_))));
}

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("rss.json");
    fs::write(&p, "{ not json").unwrap();
    let err = FeedProvider::from_path(&p, 3).read(3).await.unwrap_err();
    assert!(matches!(err, SourceError::Parse(_)), "got {err:?}");
}
