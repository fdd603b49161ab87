// src/ingest/providers/monitor.rs
//! Monitoring ("scout") provider.
//!
//! Two phases: `ensure_scout` registers one durable remote task per topic
//! (idempotent, persisted in a [`ScoutStore`]), and `poll` fetches that
//! task's updates within a bounded, cancellable time window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorSettings;
use crate::ingest::clean_html;
use crate::ingest::error::SourceError;
use crate::ingest::providers::truncate_chars;
use crate::ingest::scout_store::ScoutStore;
use crate::ingest::types::{iso_utc, Item, ItemSource, SourceProvider};

/// Epoch values above this are milliseconds.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Serialize)]
struct CreateScout<'a> {
    query: &'a str,
    skip_email: bool,
}

/// Natural-language instruction sent when creating a scout.
pub fn monitor_instruction(topic: &str) -> String {
    format!(
        "Monitor breaking news and major incident updates about: {topic}. \
         Return concise summaries with citations and include source URLs."
    )
}

/// Title used for every update of `topic` (upstream has no per-update titles).
pub fn update_title(topic: &str) -> String {
    format!("Monitor update: {topic}")
}

/// Turn an upstream timestamp into epoch seconds.
///
/// Accepts integers, floats and numeric strings. Millisecond values are
/// scaled down; null, garbage, negative or non-finite input yields `now`.
pub fn normalize_timestamp(raw: &Value, now: i64) -> i64 {
    let secs = match raw {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None => n.as_f64().and_then(float_secs),
        },
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(float_secs),
        _ => None,
    };

    match secs {
        Some(s) if s > MILLIS_THRESHOLD => s / 1000,
        Some(s) if s >= 0 => s,
        _ => now,
    }
}

fn float_secs(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up, so compare strictly below it
    (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
}

/// ISO-8601 UTC for a normalized timestamp; out-of-range values fall back to `now`.
pub fn published_iso(raw: &Value, now: DateTime<Utc>) -> String {
    let secs = normalize_timestamp(raw, now.timestamp());
    let ts = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(now);
    iso_utc(ts)
}

pub struct MonitorProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    store: Arc<dyn ScoutStore>,
    want_items: usize,
    poll_window: Duration,
    retry_interval: Duration,
    page_size: u32,
    // Serializes lookup + create + persist so one topic never gets two scouts.
    registration: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl MonitorProvider {
    pub fn new(settings: &MonitorSettings, store: Arc<dyn ScoutStore>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(settings.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            store,
            want_items: settings.want_items,
            poll_window: settings.poll_window(),
            retry_interval: settings.retry_interval(),
            page_size: settings.page_size,
            registration: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Polls started through [`SourceProvider::fetch_latest`] abort when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or(SourceError::MissingCredential("YUTORI_API_KEY"))
    }

    /// Return the scout id for `topic`, creating the remote task on first use.
    pub async fn ensure_scout(&self, topic: &str) -> Result<String, SourceError> {
        let key = self.api_key()?;
        let _guard = self.registration.lock().await;

        if let Some(scout_id) = self.store.get(topic).await? {
            tracing::info!(topic, %scout_id, "using cached scout");
            return Ok(scout_id);
        }

        tracing::info!(topic, "creating new scout");
        let instruction = monitor_instruction(topic);
        let resp = self
            .http
            .post(format!("{}/v1/scouting/tasks", self.base_url))
            .header("X-API-Key", key)
            .json(&CreateScout {
                query: &instruction,
                skip_email: true,
            })
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let body: Value = resp.json().await?;
        let scout_id = parse_scout_id(&body)
            .ok_or_else(|| SourceError::Parse("scout creation response has no id".into()))?;

        self.store.put(topic, &scout_id).await?;
        counter!("monitor_scouts_created_total").increment(1);
        tracing::info!(topic, %scout_id, "new scout created");
        Ok(scout_id)
    }

    /// One page of raw updates for `scout_id`. Records stay untyped so a
    /// malformed field degrades that field only, never the whole page.
    pub async fn fetch_updates(&self, scout_id: &str) -> Result<Vec<Value>, SourceError> {
        let key = self.api_key()?;
        let resp = self
            .http
            .get(format!(
                "{}/v1/scouting/tasks/{}/updates",
                self.base_url, scout_id
            ))
            .query(&[("page_size", self.page_size)])
            .header("X-API-Key", key)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let mut page: Value = resp.json().await?;
        let updates = match page.get_mut("updates").map(Value::take) {
            Some(Value::Array(a)) => a,
            _ => Vec::new(),
        };
        tracing::debug!(%scout_id, count = updates.len(), "monitor updates fetched");
        Ok(updates)
    }

    /// Wait up to `poll_window` for the topic's scout to report anything,
    /// then normalize the first `want_items` updates.
    ///
    /// At least one fetch is always made. Fails with
    /// [`SourceError::NoUpdatesYet`] when the window closes empty and with
    /// [`SourceError::Cancelled`] when `cancel` fires first.
    pub async fn poll(
        &self,
        topic: &str,
        want_items: usize,
        poll_window: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, SourceError> {
        let t0 = std::time::Instant::now();
        let scout_id = self.ensure_scout(topic).await?;
        let deadline = Instant::now() + poll_window;

        let updates = loop {
            counter!("monitor_poll_attempts_total").increment(1);
            let updates = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SourceError::Cancelled),
                res = self.fetch_updates(&scout_id) => res?,
            };
            if !updates.is_empty() {
                break updates;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(topic, %scout_id, "no monitor updates before deadline");
                return Err(SourceError::NoUpdatesYet { scout_id });
            }
            let nap = self.retry_interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SourceError::Cancelled),
                _ = tokio::time::sleep(nap) => {}
            }
        };

        let now = Utc::now();
        let items: Vec<Item> = updates
            .into_iter()
            .take(want_items)
            .map(|u| to_item(topic, &scout_id, &u, now))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("sources_fetch_ms", "source" => "monitor").record(ms);
        tracing::info!(topic, %scout_id, count = items.len(), "monitor poll complete");
        Ok(items)
    }
}

#[async_trait]
impl SourceProvider for MonitorProvider {
    async fn fetch_latest(&self, topic: &str) -> Result<Vec<Item>, SourceError> {
        self.poll(topic, self.want_items, self.poll_window, &self.shutdown)
            .await
    }

    fn name(&self) -> &'static str {
        "monitor"
    }

    fn kind(&self) -> ItemSource {
        ItemSource::Monitor
    }
}

fn to_item(topic: &str, scout_id: &str, u: &Value, now: DateTime<Utc>) -> Item {
    // Only the first citation counts; anything not shaped like {"url": "..."} means no url.
    let url = u
        .get("citations")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    Item {
        title: update_title(topic),
        url,
        published: published_iso(u.get("timestamp").unwrap_or(&Value::Null), now),
        content: clean_html(u.get("content").and_then(Value::as_str).unwrap_or_default()),
        source: ItemSource::Monitor,
        scout_id: Some(scout_id.to_string()),
    }
}

fn parse_scout_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status().as_u16();
    if status < 400 {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SourceError::Http {
        status,
        body: truncate_chars(&body, ERROR_BODY_LIMIT),
    })
}
