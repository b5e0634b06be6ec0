// src/feed/mod.rs
pub mod normalize;
pub mod swpc;
pub mod types;

pub use swpc::SwpcClient;
pub use types::{AlertRecord, FeedSource, FlareRecord, ForecastEntry};

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// Why a single fetch produced no data. Never leaves the feed layer.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("empty payload")]
    Empty,
}

impl FeedError {
    /// Short label for the `feed_errors_total` counter.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Transport(_) => "transport",
            FeedError::Status(_) => "status",
            FeedError::Malformed(_) => "malformed",
            FeedError::Empty => "empty",
        }
    }
}

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetches_total", "Upstream feed requests issued.");
        describe_counter!(
            "feed_errors_total",
            "Feed requests that produced no data (transport/status/parse/empty)."
        );
        describe_histogram!("feed_fetch_ms", "Upstream fetch + parse time in milliseconds.");
    });
}

/// Log and count a failed fetch; callers then fall back to "no data".
pub(crate) fn record_failure(feed: &'static str, err: &FeedError) {
    match err {
        FeedError::Empty => tracing::debug!(target: "feed", feed, "feed returned no rows"),
        _ => tracing::warn!(target: "feed", feed, error = %err, "feed fetch failed"),
    }
    counter!("feed_errors_total", "feed" => feed, "kind" => err.kind()).increment(1);
}
