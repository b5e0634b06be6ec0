// tests/poll_cycle.rs
//
// End-to-end poll cycles against an in-memory feed and a recording notifier:
// - a new X flare is announced exactly once
// - sub-threshold flares never reach a destination
// - one failing destination does not stop delivery to the others
// - a cycle started while another is still running is refused

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use solar_flare_bridge::bridge::Bridge;
use solar_flare_bridge::classify::ClassLetter;
use solar_flare_bridge::config::{BridgeConfig, Platform};
use solar_flare_bridge::feed::{AlertRecord, FeedSource, FlareRecord, ForecastEntry};
use solar_flare_bridge::notify::{Notifier, StructuredMessage};
use solar_flare_bridge::registry::{Destination, Topic};
use solar_flare_bridge::scheduler::{PollOutcome, PollScheduler};

#[derive(Default)]
struct StubFeed {
    flare: Mutex<Option<FlareRecord>>,
}

impl StubFeed {
    fn set(&self, f: Option<FlareRecord>) {
        *self.flare.lock().unwrap() = f;
    }
}

#[async_trait::async_trait]
impl FeedSource for StubFeed {
    async fn latest_flare(&self) -> Option<FlareRecord> {
        self.flare.lock().unwrap().clone()
    }
    async fn forecast(&self) -> Vec<ForecastEntry> {
        Vec::new()
    }
    async fn alerts(&self, _limit: usize) -> Vec<AlertRecord> {
        Vec::new()
    }
    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Records every delivery; destinations in `failing` return an error.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Destination, StructuredMessage)>>,
    failing: HashSet<Destination>,
}

impl RecordingNotifier {
    fn failing(ids: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: ids.iter().map(|s| Destination::new(*s)).collect(),
        }
    }

    fn attempts(&self) -> Vec<(Destination, StructuredMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, dest: &Destination, msg: &StructuredMessage) -> Result<()> {
        self.sent.lock().unwrap().push((dest.clone(), msg.clone()));
        if self.failing.contains(dest) {
            bail!("channel {dest} is gone");
        }
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

fn flare(class: &str, peak: (u32, u32)) -> FlareRecord {
    FlareRecord {
        class_label: Some(class.to_string()),
        begin_class: None,
        end_class: None,
        begin_time: None,
        peak_time: Some(Utc.with_ymd_and_hms(2025, 1, 10, peak.0, peak.1, 0).unwrap()),
        end_time: None,
        observed_at: None,
        satellite_id: "16".to_string(),
    }
}

fn setup(notifier: Arc<RecordingNotifier>) -> (Arc<StubFeed>, Arc<Bridge>, PollScheduler) {
    let feed = Arc::new(StubFeed::default());
    let cfg = BridgeConfig {
        platform: Platform::Log,
        ..BridgeConfig::default()
    };
    let bridge = Arc::new(Bridge::new(cfg, feed.clone(), notifier).expect("bridge"));
    let poller = PollScheduler::new(Arc::clone(&bridge));
    (feed, bridge, poller)
}

#[tokio::test]
async fn new_x_flare_is_announced_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (feed, bridge, poller) = setup(notifier.clone());
    bridge.registry.subscribe(Topic::Flares, Destination::new("chan-1"));
    feed.set(Some(flare("X2.5", (14, 32))));

    let first = poller.run_cycle().await;
    assert_eq!(first.label(), "notified");
    let sent = notifier.attempts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, Destination::new("chan-1"));
    assert_eq!(sent[0].1.field_value("Peak Class"), Some("X2.5"));
    assert_eq!(bridge.history.len(), 1);

    let second = poller.run_cycle().await;
    assert!(matches!(second, PollOutcome::AlreadySeen(_)));
    assert_eq!(notifier.attempts().len(), 1, "no repeat delivery");
}

#[tokio::test]
async fn magnitude_refinement_keeps_identity() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (feed, bridge, poller) = setup(notifier.clone());
    bridge.registry.subscribe(Topic::Flares, Destination::new("chan-1"));

    feed.set(Some(flare("M1.0", (9, 0))));
    poller.run_cycle().await;
    feed.set(Some(flare("M1.4", (9, 0))));
    let again = poller.run_cycle().await;
    assert_eq!(again.label(), "already_seen");

    // A later event with the same class letter is a different event.
    feed.set(Some(flare("M1.4", (11, 15))));
    assert_eq!(poller.run_cycle().await.label(), "notified");
    assert_eq!(notifier.attempts().len(), 2);
}

#[tokio::test]
async fn sub_threshold_flare_is_never_delivered() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (feed, bridge, poller) = setup(notifier.clone());
    bridge.registry.subscribe(Topic::Flares, Destination::new("chan-1"));
    feed.set(Some(flare("C1.0", (14, 0))));

    for _ in 0..3 {
        let out = poller.run_cycle().await;
        assert_eq!(out, PollOutcome::BelowThreshold(ClassLetter::C));
    }
    assert!(notifier.attempts().is_empty());
    assert!(bridge.seen.is_empty());
}

#[tokio::test]
async fn unrecognized_or_missing_data_skips_quietly() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (feed, bridge, poller) = setup(notifier.clone());
    bridge.registry.subscribe(Topic::Flares, Destination::new("chan-1"));

    assert_eq!(poller.run_cycle().await, PollOutcome::NoData);

    feed.set(Some(flare("unknown", (14, 0))));
    assert_eq!(poller.run_cycle().await, PollOutcome::Unrecognized);

    let mut no_time = flare("X1.0", (14, 0));
    no_time.peak_time = None;
    feed.set(Some(no_time));
    assert_eq!(poller.run_cycle().await, PollOutcome::Unrecognized);

    assert!(notifier.attempts().is_empty());
}

#[tokio::test]
async fn no_subscribers_means_no_fetch_work() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (feed, bridge, poller) = setup(notifier.clone());
    feed.set(Some(flare("X9.0", (14, 0))));

    assert_eq!(poller.run_cycle().await, PollOutcome::NoSubscribers);
    assert!(bridge.seen.is_empty(), "event stays unclaimed for later subscribers");
}

#[tokio::test]
async fn failing_destination_is_isolated_and_dropped() {
    let notifier = Arc::new(RecordingNotifier::failing(&["chan-a"]));
    let (feed, bridge, poller) = setup(notifier.clone());
    let a = Destination::new("chan-a");
    let b = Destination::new("chan-b");
    bridge.registry.subscribe(Topic::Flares, a.clone());
    bridge.registry.subscribe(Topic::Flares, b.clone());
    feed.set(Some(flare("M5.2", (10, 5))));

    let PollOutcome::Notified { report, .. } = poller.run_cycle().await else {
        panic!("expected a notification");
    };

    let attempted: HashSet<Destination> =
        notifier.attempts().into_iter().map(|(d, _)| d).collect();
    assert_eq!(attempted, HashSet::from([a.clone(), b.clone()]));
    assert_eq!(report.delivered, vec![b.clone()]);
    assert_eq!(report.failed, vec![a.clone()]);
    assert_eq!(report.dropped, vec![a.clone()]);

    assert!(!bridge.registry.is_subscribed(Topic::Flares, &a));
    assert!(bridge.registry.is_subscribed(Topic::Flares, &b));
}

#[tokio::test]
async fn lenient_policy_keeps_failing_destination() {
    let notifier = Arc::new(RecordingNotifier::failing(&["chan-a"]));
    let feed = Arc::new(StubFeed::default());
    let cfg = BridgeConfig {
        platform: Platform::Log,
        max_delivery_failures: 0,
        ..BridgeConfig::default()
    };
    let bridge = Arc::new(Bridge::new(cfg, feed.clone(), notifier.clone()).unwrap());
    let poller = PollScheduler::new(Arc::clone(&bridge));
    let a = Destination::new("chan-a");
    bridge.registry.subscribe(Topic::Flares, a.clone());

    feed.set(Some(flare("X1.1", (12, 0))));
    poller.run_cycle().await;
    feed.set(Some(flare("X1.1", (13, 0))));
    poller.run_cycle().await;

    assert_eq!(notifier.attempts().len(), 2);
    assert!(bridge.registry.is_subscribed(Topic::Flares, &a));
    assert_eq!(bridge.health.failures(Topic::Flares, &a), 2);
}

/// Feed whose flare fetch takes a while, so two cycles can overlap.
struct SlowFeed {
    flare: FlareRecord,
    delay: Duration,
}

#[async_trait::async_trait]
impl FeedSource for SlowFeed {
    async fn latest_flare(&self) -> Option<FlareRecord> {
        tokio::time::sleep(self.delay).await;
        Some(self.flare.clone())
    }
    async fn forecast(&self) -> Vec<ForecastEntry> {
        Vec::new()
    }
    async fn alerts(&self, _limit: usize) -> Vec<AlertRecord> {
        Vec::new()
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test]
async fn overlapping_cycles_are_refused() {
    let notifier = Arc::new(RecordingNotifier::default());
    let feed = Arc::new(SlowFeed {
        flare: flare("X3.0", (16, 0)),
        delay: Duration::from_millis(100),
    });
    let cfg = BridgeConfig {
        platform: Platform::Log,
        ..BridgeConfig::default()
    };
    let bridge = Arc::new(Bridge::new(cfg, feed, notifier.clone()).unwrap());
    bridge.registry.subscribe(Topic::Flares, Destination::new("chan-1"));
    let poller = PollScheduler::new(Arc::clone(&bridge));

    // The first cycle holds the guard while it waits on the feed.
    let (a, b) = tokio::join!(poller.run_cycle(), poller.run_cycle());
    let mut labels = [a.label(), b.label()];
    labels.sort();
    assert_eq!(labels, ["busy", "notified"]);
    assert_eq!(notifier.attempts().len(), 1);

    // Guard is released once the cycle finishes.
    assert_eq!(poller.run_cycle().await.label(), "already_seen");
}
