// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::ingest::aggregator::Aggregator;
use crate::ingest::types::SourcesResponse;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub default_topic: Arc<str>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, default_topic: impl Into<Arc<str>>) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            default_topic: default_topic.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sources", get(sources))
        // Dev posture: any origin, any method.
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SourcesQuery {
    topic: Option<String>,
}

async fn sources(
    State(state): State<AppState>,
    Query(q): Query<SourcesQuery>,
) -> Json<SourcesResponse> {
    // Providers see the trimmed topic; the response echoes what the caller sent.
    let raw = q
        .topic
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| state.default_topic.to_string());
    let mut resp = state.aggregator.aggregate(raw.trim()).await;
    resp.topic = raw;
    Json(resp)
}
