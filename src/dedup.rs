//! # Deduplication Store
//! Remembers which flare events have already been announced.
//!
//! Identity is `(event time, class letter)`. A magnitude refinement of the
//! same event (M1.0 → M1.2 at the same peak time) keeps its identity; a
//! revised timestamp upstream produces a new identity and may be announced
//! twice. That is a known limitation of the feed, not something to paper over
//! by loosening the key.
//!
//! The set only grows; qualifying events arrive a handful of times per day.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use crate::classify::ClassLetter;
use crate::feed::FlareRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlareEventId {
    pub at: DateTime<Utc>,
    pub letter: ClassLetter,
}

impl FlareEventId {
    /// `None` when the record has no usable timestamp or class.
    pub fn of(record: &FlareRecord) -> Option<Self> {
        Some(Self {
            at: record.event_time()?,
            letter: record.class()?.letter,
        })
    }
}

impl fmt::Display for FlareEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.at.format("%Y-%m-%dT%H:%M:%SZ"), self.letter)
    }
}

#[derive(Debug, Default)]
pub struct SeenEvents {
    inner: Mutex<HashSet<FlareEventId>>,
}

impl SeenEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure read.
    pub fn is_new(&self, id: &FlareEventId) -> bool {
        !self.lock().contains(id)
    }

    /// Idempotent insert. Returns `true` if the id was not present before,
    /// which lets a caller check-and-claim in one step.
    pub fn accept(&self, id: FlareEventId) -> bool {
        self.lock().insert(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<FlareEventId>> {
        // A panic while holding this lock cannot leave the set half-updated.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}
