// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /sources (explicit topic, default topic, failing provider)
// - full app built from config against mock upstreams

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _; // for `oneshot`
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_aggregator::config::SourcesConfig;
use news_aggregator::ingest::aggregator::Aggregator;
use news_aggregator::ingest::error::SourceError;
use news_aggregator::ingest::types::SourceProvider;
use news_aggregator::{api, AppState, Item, ItemSource};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Echoes the requested topic back as the item title.
struct Echo;

#[async_trait]
impl SourceProvider for Echo {
    async fn fetch_latest(&self, topic: &str) -> Result<Vec<Item>, SourceError> {
        Ok(vec![Item {
            title: topic.to_string(),
            url: format!("https://echo.example/{}", topic.replace(' ', "-")),
            published: "2025-09-06T09:00:00Z".into(),
            content: "echo".into(),
            source: ItemSource::Search,
            scout_id: None,
        }])
    }
    fn name(&self) -> &'static str {
        "search"
    }
    fn kind(&self) -> ItemSource {
        ItemSource::Search
    }
}

struct Down;

#[async_trait]
impl SourceProvider for Down {
    async fn fetch_latest(&self, _topic: &str) -> Result<Vec<Item>, SourceError> {
        Err(SourceError::Cancelled)
    }
    fn name(&self) -> &'static str {
        "monitor"
    }
    fn kind(&self) -> ItemSource {
        ItemSource::Monitor
    }
}

fn test_router() -> Router {
    let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(Echo), Arc::new(Down)];
    api::router(AppState::new(Aggregator::new(providers), "earthquake"))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = test_router().oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "ok");
}

#[tokio::test]
async fn sources_uses_query_topic() {
    let (status, body) = get_json(test_router(), "/sources?topic=airport%20outage").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"], "airport outage");
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["title"], "airport outage");
    assert_eq!(body["items"][0]["source"], "search");
    assert!(body["items"][0].get("scout_id").is_none());
}

#[tokio::test]
async fn sources_echoes_topic_verbatim_but_queries_trimmed() {
    let (status, body) = get_json(test_router(), "/sources?topic=%20quake%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"], " quake ");
    // Echo provider titles items with the topic it was called with.
    assert_eq!(body["items"][0]["title"], "quake");
}

#[tokio::test]
async fn sources_defaults_topic_when_missing_or_blank() {
    for uri in ["/sources", "/sources?topic=", "/sources?topic=%20%20"] {
        let (status, body) = get_json(test_router(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["topic"], "earthquake", "{uri}");
    }
}

#[tokio::test]
async fn full_app_serves_all_three_sources() {
    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "s1", "url": "https://s.example/1", "content": "a"},
                {"title": "s2", "url": "https://s.example/2", "content": "b"},
                {"title": "s3", "url": "https://s.example/3", "content": "c"}
            ]
        })))
        .expect(1)
        .mount(&search)
        .await;

    let monitor = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scouting/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sc-e2e"})))
        .expect(1)
        .mount(&monitor)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/scouting/tasks/sc-e2e/updates$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [
                {"timestamp": 1_700_000_000, "content": "m1", "citations": [{"url": "https://m.example/1"}]},
                {"timestamp": 1_700_000_000_000i64, "content": "m2", "citations": [{"url": "https://m.example/2"}]}
            ]
        })))
        .mount(&monitor)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let feed = dir.path().join("rss.json");
    std::fs::write(
        &feed,
        r#"{"items": [
            {"title": "f1", "link": "https://f.example/1"},
            {"title": "f2", "link": "https://f.example/2"},
            {"title": "f3", "link": "https://f.example/3"}
        ]}"#,
    )
    .unwrap();

    let mut cfg = SourcesConfig::default();
    cfg.search.base_url = search.uri();
    cfg.search.api_key = Some("tvly-test".into());
    cfg.monitor.base_url = monitor.uri();
    cfg.monitor.api_key = Some("yt-test".into());
    cfg.monitor.scout_store_path = None;
    // Warm the requested topic so registration happens once, at startup.
    cfg.monitor.warmup_topics = vec!["quake".into()];
    cfg.feed.path = Some(feed);

    let app = news_aggregator::build_app(&cfg, CancellationToken::new())
        .await
        .expect("build app");
    let (status, body) = get_json(app, "/sources?topic=quake").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 8);
    let sources: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["source"].as_str().unwrap())
        .collect();
    assert_eq!(
        sources,
        ["search", "search", "search", "monitor", "monitor", "feed", "feed", "feed"]
    );
    assert_eq!(body["items"][3]["scout_id"], "sc-e2e");
    for it in body["items"].as_array().unwrap() {
        for key in ["title", "url", "published", "content", "source"] {
            assert!(it.get(key).is_some(), "missing {key}");
        }
        let published = it["published"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(published).is_ok());
    }
}
