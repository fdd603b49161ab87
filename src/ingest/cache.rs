//! # Search Cache
//! Per-topic in-memory cache for search results.
//!
//! Entries are never evicted: once older than the TTL they stop being
//! served as hits but remain available as a fallback when the provider
//! rate-limits us.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::ingest::types::Item;

#[derive(Debug, Clone)]
struct CacheEntry {
    captured_at: Instant,
    items: Vec<Item>,
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Younger than the TTL; serve as-is.
    Fresh(Vec<Item>),
    /// Expired but kept for rate-limit fallback.
    Stale(Vec<Item>),
    Miss,
}

/// Thread-safe topic → items cache with an absolute TTL (no sliding refresh).
#[derive(Debug)]
pub struct SearchCache {
    ttl: Duration,
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, topic: &str, now: Instant) -> Lookup {
        let map = self.inner.lock().expect("search cache mutex poisoned");
        match map.get(topic) {
            None => Lookup::Miss,
            Some(e) if now.saturating_duration_since(e.captured_at) < self.ttl => {
                Lookup::Fresh(e.items.clone())
            }
            Some(e) => Lookup::Stale(e.items.clone()),
        }
    }

    /// Store results for `topic`. Empty result sets are ignored.
    pub fn insert(&self, topic: &str, items: Vec<Item>, now: Instant) {
        if items.is_empty() {
            return;
        }
        let mut map = self.inner.lock().expect("search cache mutex poisoned");
        map.insert(
            topic.to_string(),
            CacheEntry {
                captured_at: now,
                items,
            },
        );
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("search cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
