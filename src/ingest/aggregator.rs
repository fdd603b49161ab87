// src/ingest/aggregator.rs
use std::sync::Arc;

use metrics::counter;

use crate::ingest::types::{Item, SourceProvider, SourcesResponse};
use crate::ingest::{dedup_by_key, ensure_metrics_described};

/// Fans a topic out to every provider and merges the results.
pub struct Aggregator {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl Aggregator {
    /// Providers are ordered search → monitor → feed regardless of input order.
    pub fn new(mut providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        providers.sort_by_key(|p| p.kind().priority());
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Never fails: a provider error costs that provider's items, nothing more.
    pub async fn aggregate(&self, topic: &str) -> SourcesResponse {
        ensure_metrics_described();

        let mut merged: Vec<Item> = Vec::new();
        for p in &self.providers {
            match p.fetch_latest(topic).await {
                Ok(mut items) => {
                    counter!("sources_items_total", "source" => p.name())
                        .increment(items.len() as u64);
                    merged.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(error = %e, provider = p.name(), topic, "provider error");
                    counter!("sources_provider_errors_total", "source" => p.name()).increment(1);
                }
            }
        }

        let fetched = merged.len();
        let (items, dup, keyless) = dedup_by_key(merged);
        counter!("sources_dedup_dropped_total").increment((dup + keyless) as u64);

        tracing::info!(
            topic,
            fetched,
            kept = items.len(),
            dup,
            keyless,
            "sources aggregated"
        );

        SourcesResponse {
            topic: topic.to_string(),
            count: items.len(),
            items,
        }
    }
}
