// src/ingest/providers/feed.rs
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::histogram;
use serde_json::Value;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::FeedSettings;
use crate::ingest::clean_html;
use crate::ingest::error::SourceError;
use crate::ingest::providers::first_non_empty;
use crate::ingest::types::{iso_utc, Item, ItemSource, SourceProvider};

/// Reads the JSON file an external ingestion job drops on disk.
/// Accepts `{"items": [...]}` or a bare `[...]`.
pub struct FeedProvider {
    path: Option<PathBuf>,
    max_results: usize,
}

impl FeedProvider {
    pub fn new(settings: &FeedSettings) -> Self {
        Self {
            path: settings.path.clone(),
            max_results: settings.max_results,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>, max_results: usize) -> Self {
        Self {
            path: Some(path.into()),
            max_results,
        }
    }

    /// Map up to `max_results` records. Missing path/file or an empty list
    /// is a configuration error and is returned as such.
    pub async fn read(&self, max_results: usize) -> Result<Vec<Item>, SourceError> {
        let t0 = std::time::Instant::now();
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| SourceError::Config("feed path is not configured (FEED_JSON_PATH)".into()))?;
        if !path.exists() {
            return Err(SourceError::Config(format!(
                "feed JSON not found: {}",
                path.display()
            )));
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let items = parse_feed(&raw, max_results, Utc::now())?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("sources_fetch_ms", "source" => "feed").record(ms);
        tracing::debug!(path = %path.display(), count = items.len(), "feed read");
        Ok(items)
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch_latest(&self, _topic: &str) -> Result<Vec<Item>, SourceError> {
        self.read(self.max_results).await
    }

    fn name(&self) -> &'static str {
        "feed"
    }

    fn kind(&self) -> ItemSource {
        ItemSource::Feed
    }
}

/// Parse a feed document and map its first `max_results` records.
pub fn parse_feed(raw: &str, max_results: usize, now: DateTime<Utc>) -> Result<Vec<Item>, SourceError> {
    let doc: Value = serde_json::from_str(raw)?;
    let records = match &doc {
        Value::Array(a) => Some(a),
        Value::Object(o) => o.get("items").and_then(Value::as_array),
        _ => None,
    };
    let records = match records {
        Some(r) if !r.is_empty() => r,
        _ => return Err(SourceError::Config("feed JSON has no items list".into())),
    };

    Ok(records
        .iter()
        .take(max_results)
        .map(|rec| record_to_item(rec, now))
        .collect())
}

fn record_to_item(rec: &Value, now: DateTime<Utc>) -> Item {
    let field = |k: &str| rec.get(k).and_then(Value::as_str);

    let published = first_non_empty([field("published"), field("pubDate")])
        .map(|p| normalize_published(&p, now))
        .unwrap_or_else(|| iso_utc(now));

    Item {
        title: first_non_empty([field("title"), field("name")])
            .unwrap_or_else(|| "Untitled RSS Item".to_string()),
        url: first_non_empty([field("link"), field("url")])
            .map(|u| u.trim().to_string())
            .unwrap_or_default(),
        published,
        content: clean_html(
            &first_non_empty([field("description"), field("content"), field("summary")])
                .unwrap_or_default(),
        ),
        source: ItemSource::Feed,
        scout_id: None,
    }
}

/// RFC 3339, RFC 2822 (typical RSS `pubDate`) or a zone-less ISO stamp read as UTC.
/// Anything else becomes `now`.
pub fn normalize_published(raw: &str, now: DateTime<Utc>) -> String {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return iso_utc(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_rfc2822_to_unix(s).and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)) {
        return iso_utc(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return iso_utc(naive.and_utc());
    }
    iso_utc(now)
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}
