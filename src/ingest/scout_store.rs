// src/ingest/scout_store.rs
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::ingest::error::SourceError;

/// Durable topic → scout id mapping.
#[async_trait::async_trait]
pub trait ScoutStore: Send + Sync {
    async fn get(&self, topic: &str) -> Result<Option<String>, SourceError>;
    /// Insert one mapping as a single read-modify-write, keeping every other entry.
    async fn put(&self, topic: &str, scout_id: &str) -> Result<(), SourceError>;
}

/// In-process store, used by tests and when no file path is configured.
#[derive(Debug, Default)]
pub struct MemoryScoutStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryScoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Mutex::new(map),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().expect("scout store mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl ScoutStore for MemoryScoutStore {
    async fn get(&self, topic: &str) -> Result<Option<String>, SourceError> {
        let map = self.inner.lock().expect("scout store mutex poisoned");
        Ok(map.get(topic).cloned())
    }

    async fn put(&self, topic: &str, scout_id: &str) -> Result<(), SourceError> {
        let mut map = self.inner.lock().expect("scout store mutex poisoned");
        map.insert(topic.to_string(), scout_id.to_string());
        Ok(())
    }
}

/// Flat JSON object on disk, e.g. `{"earthquake": "sc_123"}`.
///
/// Every write re-reads the file under an async lock and replaces it via
/// temp file + rename, so concurrent registrations for different topics
/// cannot drop each other's entries.
#[derive(Debug)]
pub struct FileScoutStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileScoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, SourceError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "scout store unreadable, starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn save(&self, map: &BTreeMap<String, String>) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScoutStore for FileScoutStore {
    async fn get(&self, topic: &str) -> Result<Option<String>, SourceError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(topic).cloned())
    }

    async fn put(&self, topic: &str, scout_id: &str) -> Result<(), SourceError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(topic.to_string(), scout_id.to_string());
        self.save(&map).await
    }
}
