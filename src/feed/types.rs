// src/feed/types.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{classify, FlareClass};

/// Canonical flare record, produced once by `normalize` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlareRecord {
    /// Peak class as reported (`max_class`, else `current_class`).
    pub class_label: Option<String>,
    pub begin_class: Option<String>,
    pub end_class: Option<String>,
    pub begin_time: Option<DateTime<Utc>>,
    pub peak_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Observation tag of the record (`time_tag`).
    pub observed_at: Option<DateTime<Utc>>,
    pub satellite_id: String,
}

impl FlareRecord {
    pub fn class(&self) -> Option<FlareClass> {
        self.class_label.as_deref().and_then(classify)
    }

    /// Time that identifies the event: peak, else observation tag, else begin.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.peak_time.or(self.observed_at).or(self.begin_time)
    }

    pub fn class_or_unknown(&self) -> &str {
        self.class_label.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub kind: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub body: String,
    pub region_ids: Vec<String>,
    pub source_id: Option<String>,
}

/// One forecast day. Probabilities are percentages, index 0 = 1-day outlook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub date: NaiveDate,
    pub m_class_pct: [u8; 3],
    pub x_class_pct: [u8; 3],
}

/// Read side of the upstream feeds. Implementations never fail: transport or
/// parse problems are logged and surface as the empty value.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn latest_flare(&self) -> Option<FlareRecord>;
    /// At most three entries, upstream order.
    async fn forecast(&self) -> Vec<ForecastEntry>;
    /// Flare-related alerts only, most recent last, at most `limit`.
    async fn alerts(&self, limit: usize) -> Vec<AlertRecord>;
    fn name(&self) -> &'static str;
}
