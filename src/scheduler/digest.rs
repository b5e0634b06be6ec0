// src/scheduler/digest.rs
//! Digest Scheduler: checked on a coarse interval, fires once per local
//! calendar day when the wall clock enters `[digest_hour:00, digest_hour:window)`.
//!
//! The day marker is updated before fanout so a partially failed fanout can
//! never make the digest fire twice inside the same window.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::CycleGuard;
use crate::bridge::Bridge;
use crate::dedup::FlareEventId;
use crate::feed::ForecastEntry;
use crate::notify::format::{self, DigestContent};
use crate::notify::{fanout, FanoutReport};
use crate::registry::Topic;

#[derive(Debug, Clone, PartialEq)]
pub enum DigestOutcome {
    Busy,
    NoSubscribers,
    OutsideWindow,
    AlreadySent(NaiveDate),
    Sent {
        date: NaiveDate,
        report: FanoutReport,
    },
}

impl DigestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DigestOutcome::Busy => "busy",
            DigestOutcome::NoSubscribers => "no_subscribers",
            DigestOutcome::OutsideWindow => "outside_window",
            DigestOutcome::AlreadySent(_) => "already_sent",
            DigestOutcome::Sent { .. } => "sent",
        }
    }
}

/// Today's forecast row: exact date match, else the first (most recent) row.
pub fn select_forecast(rows: &[ForecastEntry], date: NaiveDate) -> Option<ForecastEntry> {
    rows.iter()
        .find(|r| r.date == date)
        .or_else(|| rows.first())
        .cloned()
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_sent_total", "Daily digests built and fanned out.");
    });
}

pub struct DigestScheduler {
    bridge: Arc<Bridge>,
    guard: CycleGuard,
    /// Local date of the last digest sent.
    marker: Mutex<Option<NaiveDate>>,
}

impl DigestScheduler {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            guard: CycleGuard::default(),
            marker: Mutex::new(None),
        }
    }

    pub fn last_sent(&self) -> Option<NaiveDate> {
        *self.marker.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Whether `now` falls inside the configured local window.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.bridge.tz);
        local.hour() == self.bridge.cfg.digest_hour
            && local.minute() < self.bridge.cfg.digest_window_minutes
    }

    /// Claim `date` in the marker. Returns `false` if it was already claimed.
    fn claim(&self, date: NaiveDate) -> bool {
        let mut m = self.marker.lock().unwrap_or_else(|p| p.into_inner());
        if *m == Some(date) {
            return false;
        }
        *m = Some(date);
        true
    }

    /// Scheduler tick evaluated at `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> DigestOutcome {
        ensure_metrics_described();
        let Some(_ticket) = self.guard.try_enter() else {
            return DigestOutcome::Busy;
        };
        let b = &self.bridge;
        if !b.registry.has_targets(Topic::Digest) {
            return DigestOutcome::NoSubscribers;
        }
        if !self.in_window(now) {
            return DigestOutcome::OutsideWindow;
        }
        let today = now.with_timezone(&b.tz).date_naive();
        if !self.claim(today) {
            return DigestOutcome::AlreadySent(today);
        }
        let report = self.send(today, now).await;
        DigestOutcome::Sent {
            date: today,
            report,
        }
    }

    /// Build and fan out the digest for `date` regardless of window or marker.
    pub async fn send(&self, date: NaiveDate, now: DateTime<Utc>) -> FanoutReport {
        let b = &self.bridge;
        let content = self.build(date).await;
        let msg = Arc::new(format::digest_message(&content, b.tz, now));
        let report = fanout(
            Arc::clone(&b.notifier),
            &b.registry,
            &b.health,
            Topic::Digest,
            msg,
            b.cfg.delivery_timeout(),
        )
        .await;
        counter!("digest_sent_total").increment(1);
        tracing::info!(
            target: "digest",
            %date,
            flares = content.flares.len(),
            alerts = content.alerts.len(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "daily digest sent"
        );
        report
    }

    /// Gather forecast, today's flares and today's alerts for `date`.
    pub async fn build(&self, date: NaiveDate) -> DigestContent {
        let b = &self.bridge;
        let tz = b.tz;
        let on_date = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.with_timezone(&tz).date_naive() == date)
                .unwrap_or(false)
        };

        let forecast = select_forecast(&b.feed.forecast().await, date);

        let alerts = b
            .feed
            .alerts(b.cfg.digest_alert_fetch)
            .await
            .into_iter()
            .filter(|a| on_date(a.issued_at))
            .collect();

        let mut seen: HashSet<FlareEventId> = HashSet::new();
        let mut flares = Vec::new();
        for e in b.history.on_local_date(date, tz) {
            if seen.insert(e.id) {
                flares.push(e.record);
            }
        }
        if let Some(latest) = b.feed.latest_flare().await {
            let fresh = FlareEventId::of(&latest).map_or(true, |id| seen.insert(id));
            if fresh && on_date(latest.event_time()) {
                flares.push(latest);
            }
        }
        flares.sort_by_key(|f| f.event_time());

        DigestContent {
            date,
            forecast,
            flares,
            alerts,
            alert_cap: b.cfg.digest_alert_cap,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.bridge.cfg.digest_check_interval();
        tokio::spawn(async move {
            tracing::info!(
                target: "digest",
                interval_secs = period.as_secs(),
                hour = self.bridge.cfg.digest_hour,
                tz = self.bridge.tz.name(),
                "digest scheduler started"
            );
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let me = Arc::clone(&self);
                tokio::spawn(async move {
                    let outcome = me.tick_at(Utc::now()).await;
                    tracing::trace!(target: "digest", outcome = outcome.label(), "digest tick");
                });
            }
        })
    }
}
