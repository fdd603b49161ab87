// src/ingest/providers/mod.rs
pub mod feed;
pub mod monitor;
pub mod search;

/// First candidate that is present and not blank, as an owned string.
pub(crate) fn first_non_empty<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Cut `s` to at most `max` characters (not bytes).
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
