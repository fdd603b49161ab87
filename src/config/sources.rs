// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/sources.toml";
pub const DEFAULT_JSON_PATH: &str = "config/sources.json";

pub const ENV_SEARCH_API_KEY: &str = "TAVILY_API_KEY";
pub const ENV_MONITOR_API_KEY: &str = "YUTORI_API_KEY";
pub const ENV_FEED_PATH: &str = "FEED_JSON_PATH";
/// Older deployments exported the feed path under the ingestion tool's name.
pub const ENV_FEED_PATH_LEGACY: &str = "AIRBYTE_RSS_JSON_PATH";
pub const ENV_SEARCH_BASE_URL: &str = "SEARCH_BASE_URL";
pub const ENV_MONITOR_BASE_URL: &str = "MONITOR_BASE_URL";
pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";

pub const DEFAULT_TOPIC: &str = "earthquake";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// Topic used when `/sources` is called without `?topic=`.
    pub default_topic: String,
    pub metrics_enabled: bool,
    pub search: SearchSettings,
    pub monitor: MonitorSettings,
    pub feed: FeedSettings,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_topic: DEFAULT_TOPIC.to_string(),
            metrics_enabled: false,
            search: SearchSettings::default(),
            monitor: MonitorSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    /// `"ENV"` means: read from TAVILY_API_KEY.
    pub api_key: Option<String>,
    pub max_results: usize,
    pub cache_ttl_secs: u64,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            max_results: 3,
            cache_ttl_secs: 120,
            min_interval_ms: 8_000,
            timeout_secs: 20,
        }
    }
}

impl SearchSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub base_url: String,
    /// `"ENV"` means: read from YUTORI_API_KEY.
    pub api_key: Option<String>,
    pub want_items: usize,
    pub poll_seconds: u64,
    pub retry_interval_ms: u64,
    pub page_size: u32,
    pub timeout_secs: u64,
    /// Flat JSON file holding topic → scout id. `None` keeps the mapping in memory.
    pub scout_store_path: Option<PathBuf>,
    /// Topics registered at startup so first requests find warm scouts.
    pub warmup_topics: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.yutori.com".to_string(),
            api_key: None,
            want_items: 2,
            poll_seconds: 120,
            retry_interval_ms: 3_000,
            page_size: 20,
            timeout_secs: 30,
            scout_store_path: Some(PathBuf::from("yutori_scout_cache.json")),
            warmup_topics: vec![
                "earthquake".to_string(),
                "cyberattack".to_string(),
                "airport outage".to_string(),
            ],
        }
    }
}

impl MonitorSettings {
    pub fn poll_window(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedSettings {
    pub path: Option<PathBuf>,
    pub max_results: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_results: 3,
        }
    }
}

impl SourcesConfig {
    /// Defaults + environment overrides, no file lookup.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.sanitize();
        cfg
    }

    /// Override file values with whatever the environment provides.
    pub fn apply_env(&mut self) {
        match env_non_empty(ENV_SEARCH_API_KEY) {
            Some(k) => self.search.api_key = Some(k),
            None if is_env_marker(&self.search.api_key) => self.search.api_key = None,
            None => {}
        }
        match env_non_empty(ENV_MONITOR_API_KEY) {
            Some(k) => self.monitor.api_key = Some(k),
            None if is_env_marker(&self.monitor.api_key) => self.monitor.api_key = None,
            None => {}
        }
        if let Some(p) = env_non_empty(ENV_FEED_PATH).or_else(|| env_non_empty(ENV_FEED_PATH_LEGACY)) {
            self.feed.path = Some(PathBuf::from(p));
        }
        if let Some(u) = env_non_empty(ENV_SEARCH_BASE_URL) {
            self.search.base_url = u;
        }
        if let Some(u) = env_non_empty(ENV_MONITOR_BASE_URL) {
            self.monitor.base_url = u;
        }
        if let Some(v) = env_non_empty(ENV_METRICS_ENABLED) {
            self.metrics_enabled = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Replace nonsensical values with defaults.
    pub fn sanitize(&mut self) {
        let d_search = SearchSettings::default();
        let d_monitor = MonitorSettings::default();
        let d_feed = FeedSettings::default();

        if self.default_topic.trim().is_empty() {
            self.default_topic = DEFAULT_TOPIC.to_string();
        }
        if self.search.max_results == 0 {
            self.search.max_results = d_search.max_results;
        }
        if self.monitor.want_items == 0 {
            self.monitor.want_items = d_monitor.want_items;
        }
        if self.monitor.page_size == 0 {
            self.monitor.page_size = d_monitor.page_size;
        }
        if self.feed.max_results == 0 {
            self.feed.max_results = d_feed.max_results;
        }
        trim_trailing_slash(&mut self.search.base_url);
        trim_trailing_slash(&mut self.monitor.base_url);
        self.monitor.warmup_topics.retain(|t| !t.trim().is_empty());
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<SourcesConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in defaults
pub fn load_default() -> Result<SourcesConfig> {
    let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_from(&pb)?
    } else if Path::new(DEFAULT_TOML_PATH).exists() {
        load_from(Path::new(DEFAULT_TOML_PATH))?
    } else if Path::new(DEFAULT_JSON_PATH).exists() {
        load_from(Path::new(DEFAULT_JSON_PATH))?
    } else {
        SourcesConfig::default()
    };
    cfg.apply_env();
    cfg.sanitize();

    // Safe diagnostics: key presence only, never the key itself
    tracing::info!(
        search_key = cfg.search.api_key.is_some(),
        monitor_key = cfg.monitor.api_key.is_some(),
        feed_path = cfg.feed.path.is_some(),
        metrics = cfg.metrics_enabled,
        "sources config loaded"
    );
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<SourcesConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("parsing sources config as JSON");
    }
    toml::from_str(s).context("parsing sources config as TOML")
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_env_marker(v: &Option<String>) -> bool {
    v.as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("env"))
}

fn trim_trailing_slash(s: &mut String) {
    while s.ends_with('/') {
        s.pop();
    }
}
