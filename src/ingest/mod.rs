// src/ingest/mod.rs
pub mod aggregator;
pub mod cache;
pub mod error;
pub mod providers;
pub mod scout_store;
pub mod throttle;
pub mod types;

use crate::ingest::types::Item;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sources_items_total", "Items returned per provider.");
        describe_counter!(
            "sources_provider_errors_total",
            "Provider failures swallowed by the aggregator."
        );
        describe_counter!(
            "sources_dedup_dropped_total",
            "Items removed by URL/title deduplication."
        );
        describe_histogram!("sources_fetch_ms", "Provider fetch time in milliseconds.");
        describe_counter!("search_cache_hits_total", "Search calls served from cache.");
        describe_counter!(
            "search_rate_limited_total",
            "Search calls answered with HTTP 429."
        );
        describe_gauge!("search_cache_ttl_secs", "Configured search cache TTL.");
        describe_counter!(
            "monitor_scouts_created_total",
            "Remote monitoring tasks created."
        );
        describe_counter!(
            "monitor_poll_attempts_total",
            "Update list fetches made while polling."
        );
    });
}

/// Strip markup and fold whitespace into plain text.
/// Tags become spaces (so `a<br>b` stays two words), entities are decoded.
pub fn clean_html(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]*>").unwrap());
    let out = re_tags.replace_all(s, " ");

    let out = html_escape::decode_html_entities(&out);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Key used to recognise the same story across providers:
/// trimmed url if present, else trimmed title. `None` when both are blank.
pub fn dedup_key(item: &Item) -> Option<&str> {
    let url = item.url.trim();
    if !url.is_empty() {
        return Some(url);
    }
    let title = item.title.trim();
    (!title.is_empty()).then_some(title)
}

/// Single-pass dedup keeping the first occurrence of each key.
/// Items without a usable key are dropped.
/// Returns (kept, duplicates_dropped, keyless_dropped).
pub fn dedup_by_key(items: Vec<Item>) -> (Vec<Item>, usize, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(items.len());
    let mut dup = 0usize;
    let mut keyless = 0usize;

    for it in items {
        let key = match dedup_key(&it) {
            Some(k) => k.to_string(),
            None => {
                keyless += 1;
                continue;
            }
        };
        if !seen.insert(key) {
            dup += 1;
            continue;
        }
        keep.push(it);
    }

    (keep, dup, keyless)
}
