// src/lib.rs
// Public library surface for the service binary, the demo bin and integration tests.

pub mod api;
pub mod bridge;
pub mod classify;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod history;
pub mod metrics;
pub mod registry;

// Upstream SWPC feeds
pub mod feed;

// Outbound chat delivery & background jobs
pub mod notify;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::bridge::Bridge;
pub use crate::classify::{classify, ClassLetter, FlareClass, Severity};
pub use crate::config::{BridgeConfig, Platform};
pub use crate::dedup::FlareEventId;
pub use crate::feed::{FeedSource, FlareRecord, SwpcClient};
pub use crate::notify::{Notifier, StructuredMessage};
pub use crate::registry::{Destination, Topic};
pub use crate::scheduler::{spawn_all, DigestOutcome, PollOutcome};
