// src/ingest/types.rs
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::error::SourceError;

/// Which upstream produced an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Search,
    Monitor,
    Feed,
}

impl ItemSource {
    /// Merge order used by the aggregator (lower goes first).
    pub fn priority(self) -> u8 {
        match self {
            ItemSource::Search => 0,
            ItemSource::Monitor => 1,
            ItemSource::Feed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemSource::Search => "search",
            ItemSource::Monitor => "monitor",
            ItemSource::Feed => "feed",
        }
    }
}

/// Common output record every provider maps into.
///
/// All mandatory fields are plain `String`s so consumers never branch on
/// missing keys; `scout_id` is only set for monitor items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub published: String, // ISO-8601 UTC
    pub content: String,   // plain text
    pub source: ItemSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scout_id: Option<String>,
}

impl Item {
    /// Soft-error item: carries an explanation instead of news, stamped `now`.
    pub fn placeholder(source: ItemSource, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            published: iso_utc(Utc::now()),
            content: content.into(),
            source,
            scout_id: None,
        }
    }
}

/// Format an instant as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Wire shape of `GET /sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub topic: String,
    pub count: usize,
    pub items: Vec<Item>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch items for `topic`. Expected degradations are returned as data;
    /// only configuration errors and upstream exhaustion come back as `Err`.
    async fn fetch_latest(&self, topic: &str) -> Result<Vec<Item>, SourceError>;
    fn name(&self) -> &'static str;
    fn kind(&self) -> ItemSource;
}
