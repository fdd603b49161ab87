// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod ingest;
pub mod metrics;

pub use crate::api::{router, AppState};
pub use crate::ingest::types::{Item, ItemSource, SourcesResponse};

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bootstrap::{warm_up_scouts, Sources};
use crate::config::SourcesConfig;

/// Build providers from `cfg`, warm up the configured scouts and return the
/// full router (plus `/metrics` when enabled).
pub async fn build_app(cfg: &SourcesConfig, shutdown: CancellationToken) -> anyhow::Result<Router> {
    // Recorder first, so gauges set while building providers are kept.
    let metrics = if cfg.metrics_enabled {
        Some(metrics::Metrics::init().context("metrics enabled but recorder install failed")?)
    } else {
        None
    };

    let sources = Sources::from_config(cfg, shutdown);
    warm_up_scouts(&sources.monitor, &cfg.monitor.warmup_topics).await;

    let state = AppState::new(sources.aggregator(), cfg.default_topic.as_str());
    let mut app = router(state);

    if let Some(m) = metrics {
        app = app.merge(m.router());
        info!("metrics exposed on /metrics");
    }
    Ok(app)
}

/// Same as [`build_app`] with config resolved from files and environment.
pub async fn app(shutdown: CancellationToken) -> anyhow::Result<Router> {
    let cfg = config::load_default().context("loading sources config")?;
    build_app(&cfg, shutdown).await
}
