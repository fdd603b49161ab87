// src/config/mod.rs
pub mod sources;

pub use sources::{load_default, load_from, FeedSettings, MonitorSettings, SearchSettings, SourcesConfig};
