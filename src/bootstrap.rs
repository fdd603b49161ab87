// src/bootstrap.rs
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{MonitorSettings, SourcesConfig};
use crate::ingest::aggregator::Aggregator;
use crate::ingest::providers::{feed::FeedProvider, monitor::MonitorProvider, search::SearchProvider};
use crate::ingest::scout_store::{FileScoutStore, MemoryScoutStore, ScoutStore};
use crate::ingest::types::SourceProvider;

/// The three concrete providers, shared between the aggregator and startup tasks.
pub struct Sources {
    pub search: Arc<SearchProvider>,
    pub monitor: Arc<MonitorProvider>,
    pub feed: Arc<FeedProvider>,
}

impl Sources {
    /// `shutdown` aborts in-flight monitor polls.
    pub fn from_config(cfg: &SourcesConfig, shutdown: CancellationToken) -> Self {
        let store = scout_store_for(&cfg.monitor);
        Self {
            search: Arc::new(SearchProvider::new(&cfg.search)),
            monitor: Arc::new(MonitorProvider::new(&cfg.monitor, store).with_cancellation(shutdown)),
            feed: Arc::new(FeedProvider::new(&cfg.feed)),
        }
    }

    pub fn aggregator(&self) -> Aggregator {
        let providers = vec![
            self.search.clone() as Arc<dyn SourceProvider>,
            self.monitor.clone() as Arc<dyn SourceProvider>,
            self.feed.clone() as Arc<dyn SourceProvider>,
        ];
        Aggregator::new(providers)
    }
}

/// File-backed when a path is configured, otherwise process-local.
pub fn scout_store_for(settings: &MonitorSettings) -> Arc<dyn ScoutStore> {
    match &settings.scout_store_path {
        Some(path) => {
            info!(path = %path.display(), "scout store: file");
            Arc::new(FileScoutStore::new(path.clone()))
        }
        None => {
            info!("scout store: memory");
            Arc::new(MemoryScoutStore::new())
        }
    }
}

/// Register a scout for each topic so the first `/sources` call finds one ready.
/// Failures are logged and skipped. Returns how many topics have a scout.
pub async fn warm_up_scouts(monitor: &MonitorProvider, topics: &[String]) -> usize {
    if topics.is_empty() {
        return 0;
    }
    if !monitor.has_api_key() {
        warn!("scout warmup skipped: monitor API key missing");
        return 0;
    }

    let mut ready = 0usize;
    for topic in topics {
        match monitor.ensure_scout(topic).await {
            Ok(scout_id) => {
                ready += 1;
                info!(topic = %topic, %scout_id, "scout warm");
            }
            Err(e) => warn!(topic = %topic, error = %e, "scout warmup failed"),
        }
    }
    info!(ready, total = topics.len(), "scout warmup finished");
    ready
}
