// src/ingest/providers/search.rs
//! Web-search provider with a per-topic TTL cache and a global call throttle.
//!
//! Every failure mode degrades to a returned list (possibly a single
//! explanatory placeholder), so callers never see an error from here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::config::SearchSettings;
use crate::ingest::cache::{Lookup, SearchCache};
use crate::ingest::clean_html;
use crate::ingest::error::SourceError;
use crate::ingest::providers::{first_non_empty, truncate_chars};
use crate::ingest::throttle::Throttle;
use crate::ingest::types::{iso_utc, Item, ItemSource, SourceProvider};

/// Upstream error bodies are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    include_answer: bool,
}

pub struct SearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_results: usize,
    cache: Arc<SearchCache>,
    throttle: Arc<Throttle>,
    // Held across throttle wait + request so concurrent callers keep the spacing.
    gate: tokio::sync::Mutex<()>,
}

impl SearchProvider {
    pub fn new(settings: &SearchSettings) -> Self {
        let cache = Arc::new(SearchCache::new(settings.cache_ttl()));
        let throttle = Arc::new(Throttle::new(settings.min_interval()));
        Self::with_state(settings, cache, throttle)
    }

    /// Build with externally owned cache/throttle (tests, or sharing across instances).
    pub fn with_state(
        settings: &SearchSettings,
        cache: Arc<SearchCache>,
        throttle: Arc<Throttle>,
    ) -> Self {
        gauge!("search_cache_ttl_secs").set(cache.ttl().as_secs_f64());
        Self {
            http: build_http(settings.timeout()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            max_results: settings.max_results,
            cache,
            throttle,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Search `topic`, returning at most `max_results` items.
    pub async fn search(&self, topic: &str, max_results: usize) -> Vec<Item> {
        let Some(key) = self.api_key.as_deref().filter(|k| credential_usable(k)) else {
            tracing::warn!(provider = "search", "search API key missing");
            return vec![Item::placeholder(
                ItemSource::Search,
                "Search API key missing",
                "Set TAVILY_API_KEY in the environment (or .env) to enable web search results.",
            )];
        };

        let stale = match self.cache.lookup(topic, Instant::now()) {
            Lookup::Fresh(items) => return self.cache_hit(topic, items),
            Lookup::Stale(items) => Some(items),
            Lookup::Miss => None,
        };

        let _permit = self.gate.lock().await;
        // Another request may have refreshed this topic while we queued.
        if let Lookup::Fresh(items) = self.cache.lookup(topic, Instant::now()) {
            return self.cache_hit(topic, items);
        }

        self.throttle.wait().await;
        let t0 = std::time::Instant::now();
        let outcome = self.request(key, topic, max_results).await;
        self.throttle.record_call(Instant::now());
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("sources_fetch_ms", "source" => "search").record(ms);

        match outcome {
            Ok(items) => {
                self.cache.insert(topic, items.clone(), Instant::now());
                items
            }
            Err(SourceError::Http { status: 429, .. }) => {
                counter!("search_rate_limited_total").increment(1);
                tracing::warn!(topic, has_stale = stale.is_some(), "search rate limited (429)");
                stale.unwrap_or_else(|| {
                    vec![Item::placeholder(
                        ItemSource::Search,
                        "Search rate limited (429)",
                        "The search provider blocked this request due to rate limits (common with \
                         development keys). Wait a bit, reduce refresh frequency, or use a production key.",
                    )]
                })
            }
            Err(SourceError::Http { status, body }) => {
                tracing::warn!(topic, status, "search provider HTTP error");
                vec![Item::placeholder(
                    ItemSource::Search,
                    format!("Search error {status}"),
                    body,
                )]
            }
            Err(e) => {
                tracing::warn!(topic, error = %e, "search request failed");
                vec![Item::placeholder(
                    ItemSource::Search,
                    "Search request failed",
                    e.to_string(),
                )]
            }
        }
    }

    fn cache_hit(&self, topic: &str, items: Vec<Item>) -> Vec<Item> {
        counter!("search_cache_hits_total").increment(1);
        tracing::debug!(topic, count = items.len(), "search cache hit");
        items
    }

    async fn request(
        &self,
        key: &str,
        topic: &str,
        max_results: usize,
    ) -> Result<Vec<Item>, SourceError> {
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(key)
            .json(&SearchRequest {
                query: topic,
                max_results,
                include_answer: false,
            })
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status,
                body: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let body: Value = resp.json().await?;
        // Provider has no per-result timestamps; stamp with capture time.
        let items = parse_results(&body, max_results, &iso_utc(Utc::now()));
        tracing::info!(topic, count = items.len(), "search complete");
        Ok(items)
    }
}

#[async_trait]
impl SourceProvider for SearchProvider {
    async fn fetch_latest(&self, topic: &str) -> Result<Vec<Item>, SourceError> {
        Ok(self.search(topic, self.max_results).await)
    }

    fn name(&self) -> &'static str {
        "search"
    }

    fn kind(&self) -> ItemSource {
        ItemSource::Search
    }
}

/// Map up to `max_results` records. Each field is read only when it is a
/// string, so one odd record never costs the others.
fn parse_results(body: &Value, max_results: usize, published: &str) -> Vec<Item> {
    let Some(records) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    records
        .iter()
        .take(max_results)
        .map(|r| {
            let field = |k: &str| r.get(k).and_then(Value::as_str);
            Item {
                title: first_non_empty([field("title")]).unwrap_or_else(|| "Untitled".to_string()),
                url: field("url").map(|u| u.trim().to_string()).unwrap_or_default(),
                published: published.to_string(),
                content: clean_html(
                    &first_non_empty([field("content"), field("snippet")]).unwrap_or_default(),
                ),
                source: ItemSource::Search,
                scout_id: None,
            }
        })
        .collect()
}

/// Blank keys and unreplaced template placeholders do not count as configured.
fn credential_usable(key: &str) -> bool {
    let k = key.trim();
    !k.is_empty() && !k.contains("REPLACE_ME")
}

fn build_http(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("news-aggregator/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_rules() {
        assert!(credential_usable("tvly-abc"));
        assert!(!credential_usable("   "));
        assert!(!credential_usable("tvly-REPLACE_ME"));
    }

    #[tokio::test]
    async fn missing_key_yields_single_placeholder() {
        let settings = SearchSettings {
            api_key: None,
            ..SearchSettings::default()
        };
        let p = SearchProvider::new(&settings);
        let items = p.search("quake", 3).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Search API key missing");
        assert_eq!(items[0].source, ItemSource::Search);
        assert!(items[0].url.is_empty());
        // No outbound call was made.
        assert!(p.throttle().last_call().is_none());
    }

    #[test]
    fn record_defaults_are_tolerant() {
        let body = serde_json::json!({"results": [
            {"title": null, "snippet": "s"},
            {},
            {"title": 42, "url": ["x"], "content": {"a": 1}, "snippet": "fallback"},
            "not an object"
        ]});
        let items = parse_results(&body, 10, "2025-01-01T00:00:00Z");
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].title, "Untitled");
        assert_eq!(items[0].content, "s");
        assert_eq!(items[2].title, "Untitled");
        assert_eq!(items[2].url, "");
        assert_eq!(items[2].content, "fallback");
        assert_eq!(items[3].title, "Untitled");
        assert!(items.iter().all(|i| i.published == "2025-01-01T00:00:00Z"));

        assert!(parse_results(&serde_json::json!({}), 3, "t").is_empty());
        assert!(parse_results(&serde_json::json!({"results": "x"}), 3, "t").is_empty());
    }
}
