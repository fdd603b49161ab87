//! Error type shared by the source providers.
//!
//! Messages never include credentials. Response bodies carried by
//! [`SourceError::Http`] are truncated before they get here.

/// Why a provider could not produce items.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A required API key is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Invalid or missing local configuration (paths, feed content).
    #[error("config error: {0}")]
    Config(String),

    /// Upstream answered with an error status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream response or local document could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Local file IO failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The monitor poll window elapsed with zero updates.
    #[error("monitor returned no updates yet for scout {scout_id}; keep it warmed up and retry in 1-3 minutes")]
    NoUpdatesYet { scout_id: String },

    /// The caller aborted a long poll.
    #[error("poll cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}
