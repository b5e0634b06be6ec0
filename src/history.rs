//! history.rs: in-memory log of announced flares, read by the daily digest.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::dedup::FlareEventId;
use crate::feed::FlareRecord;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: FlareEventId,
    pub record: FlareRecord,
    pub notified_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct FlareHistory {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
}

impl FlareHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, id: FlareEventId, record: FlareRecord, notified_at: DateTime<Utc>) {
        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push_back(HistoryEntry {
            id,
            record,
            notified_at,
        });
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    /// Entries whose event time falls on `date` in `tz`, oldest first.
    pub fn on_local_date(&self, date: NaiveDate, tz: Tz) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.iter()
            .filter(|e| e.id.at.with_timezone(&tz).date_naive() == date)
            .cloned()
            .collect()
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
