// src/scheduler/poll.rs
//! Poll Scheduler: every tick, fetch the latest flare and announce it to all
//! flare subscribers if it is a new M/X event.
//!
//! Delivery is at-most-once per event: the id is accepted before fanout, so a
//! destination whose delivery fails simply misses that flare.

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::CycleGuard;
use crate::bridge::Bridge;
use crate::classify::{qualifies, ClassLetter};
use crate::dedup::FlareEventId;
use crate::notify::{fanout, format, FanoutReport};
use crate::registry::Topic;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Previous cycle still running.
    Busy,
    NoSubscribers,
    NoData,
    /// Class string or timestamp unusable.
    Unrecognized,
    BelowThreshold(ClassLetter),
    AlreadySeen(FlareEventId),
    Notified {
        id: FlareEventId,
        report: FanoutReport,
    },
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Busy => "busy",
            PollOutcome::NoSubscribers => "no_subscribers",
            PollOutcome::NoData => "no_data",
            PollOutcome::Unrecognized => "unrecognized",
            PollOutcome::BelowThreshold(_) => "below_threshold",
            PollOutcome::AlreadySeen(_) => "already_seen",
            PollOutcome::Notified { .. } => "notified",
        }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("flare_poll_cycles_total", "Poll cycles started.");
        describe_counter!(
            "flare_poll_skipped_total",
            "Poll cycles that ended without a notification, by reason."
        );
        describe_counter!(
            "flare_notifications_total",
            "New qualifying flare events announced."
        );
        describe_counter!("delivery_failures_total", "Failed per-destination deliveries.");
        describe_counter!(
            "destinations_dropped_total",
            "Destinations unsubscribed after repeated delivery failures."
        );
        describe_gauge!("flare_poll_last_run_ts", "Unix ts of the last poll cycle.");
    });
}

pub struct PollScheduler {
    bridge: Arc<Bridge>,
    guard: CycleGuard,
}

impl PollScheduler {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            guard: CycleGuard::default(),
        }
    }

    /// One fetch → classify → dedup → fanout pass. Never fails; every early
    /// exit is reported as an outcome.
    pub async fn run_cycle(&self) -> PollOutcome {
        ensure_metrics_described();
        let Some(_ticket) = self.guard.try_enter() else {
            tracing::debug!(target: "poll", "previous cycle still running; tick skipped");
            return self.finish(PollOutcome::Busy);
        };
        counter!("flare_poll_cycles_total").increment(1);
        gauge!("flare_poll_last_run_ts").set(Utc::now().timestamp() as f64);

        let b = &self.bridge;
        if !b.registry.has_targets(Topic::Flares) {
            return self.finish(PollOutcome::NoSubscribers);
        }

        let Some(flare) = b.feed.latest_flare().await else {
            return self.finish(PollOutcome::NoData);
        };

        let Some(class) = flare.class() else {
            tracing::debug!(target: "poll", class = ?flare.class_label, "unrecognized flare class");
            return self.finish(PollOutcome::Unrecognized);
        };
        if !qualifies(Some(class.letter)) {
            tracing::trace!(target: "poll", %class, "below notification threshold");
            return self.finish(PollOutcome::BelowThreshold(class.letter));
        }

        let Some(id) = FlareEventId::of(&flare) else {
            tracing::debug!(target: "poll", %class, "qualifying flare without timestamp");
            return self.finish(PollOutcome::Unrecognized);
        };
        if !b.seen.is_new(&id) {
            return self.finish(PollOutcome::AlreadySeen(id));
        }

        let now = Utc::now();
        let msg = Arc::new(format::flare_message(&flare, b.tz, now));
        if !b.seen.accept(id) {
            return self.finish(PollOutcome::AlreadySeen(id));
        }
        b.history.push(id, flare, now);
        counter!("flare_notifications_total").increment(1);
        tracing::info!(target: "poll", %id, %class, "new qualifying flare");

        let report = fanout(
            Arc::clone(&b.notifier),
            &b.registry,
            &b.health,
            Topic::Flares,
            msg,
            b.cfg.delivery_timeout(),
        )
        .await;
        tracing::info!(
            target: "poll",
            %id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            dropped = report.dropped.len(),
            "flare fanout finished"
        );
        self.finish(PollOutcome::Notified { id, report })
    }

    fn finish(&self, outcome: PollOutcome) -> PollOutcome {
        if !matches!(outcome, PollOutcome::Notified { .. }) {
            counter!("flare_poll_skipped_total", "reason" => outcome.label()).increment(1);
        }
        outcome
    }

    /// Fixed-interval loop. Each tick runs in its own task so a slow cycle
    /// never shifts the timer; overlapping ticks are refused by the guard.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.bridge.cfg.poll_interval();
        tokio::spawn(async move {
            tracing::info!(target: "poll", interval_secs = period.as_secs(), "poll scheduler started");
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let me = Arc::clone(&self);
                tokio::spawn(async move {
                    let outcome = me.run_cycle().await;
                    tracing::trace!(target: "poll", outcome = outcome.label(), "poll tick");
                });
            }
        })
    }
}
