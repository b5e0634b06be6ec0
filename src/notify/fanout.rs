// src/notify/fanout.rs
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

use super::{Notifier, StructuredMessage};
use crate::registry::{Destination, SubscriptionRegistry, Topic};

/// Outcome of delivering one message to every destination of a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: Vec<Destination>,
    pub failed: Vec<Destination>,
    /// Failed destinations that crossed the failure threshold and were unsubscribed.
    pub dropped: Vec<Destination>,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Consecutive delivery failures per `(topic, destination)`.
#[derive(Debug)]
pub struct DeliveryHealth {
    failures: Mutex<HashMap<(Topic, Destination), u32>>,
    max_failures: u32,
}

impl DeliveryHealth {
    /// `max_failures == 0` never drops a destination.
    pub fn new(max_failures: u32) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            max_failures,
        }
    }

    pub fn record_success(&self, topic: Topic, d: &Destination) {
        self.lock().remove(&(topic, d.clone()));
    }

    /// Returns `true` when the destination should now be dropped.
    pub fn record_failure(&self, topic: Topic, d: &Destination) -> bool {
        let mut map = self.lock();
        let n = map.entry((topic, d.clone())).or_insert(0);
        *n += 1;
        if self.max_failures > 0 && *n >= self.max_failures {
            map.remove(&(topic, d.clone()));
            true
        } else {
            false
        }
    }

    pub fn failures(&self, topic: Topic, d: &Destination) -> u32 {
        self.lock().get(&(topic, d.clone())).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Topic, Destination), u32>> {
        self.failures.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Deliver `msg` to every current `topic` subscriber concurrently.
///
/// Each destination runs in its own task with its own timeout, so one slow or
/// failing channel cannot cancel or delay the verdict for its siblings.
pub async fn fanout(
    notifier: Arc<dyn Notifier>,
    registry: &SubscriptionRegistry,
    health: &DeliveryHealth,
    topic: Topic,
    msg: Arc<StructuredMessage>,
    timeout: Duration,
) -> FanoutReport {
    let targets = registry.targets(topic);
    let mut set = JoinSet::new();
    for dest in targets.iter().cloned() {
        let notifier = Arc::clone(&notifier);
        let msg = Arc::clone(&msg);
        set.spawn(async move {
            let res = match tokio::time::timeout(timeout, notifier.deliver(&dest, &msg)).await {
                Ok(r) => r,
                Err(_) => Err(anyhow::anyhow!("delivery timed out after {timeout:?}")),
            };
            (dest, res)
        });
    }

    let mut outcomes: HashMap<Destination, anyhow::Result<()>> = HashMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((dest, res)) => {
                outcomes.insert(dest, res);
            }
            Err(e) => tracing::error!(target: "fanout", error = %e, "delivery task aborted"),
        }
    }

    let mut report = FanoutReport::default();
    // Walk the snapshot so report order is stable; a panicked task counts as a failure.
    for dest in targets {
        match outcomes.remove(&dest) {
            Some(Ok(())) => {
                health.record_success(topic, &dest);
                report.delivered.push(dest);
            }
            other => {
                let reason = match other {
                    Some(Err(e)) => format!("{e:#}"),
                    _ => "delivery task panicked".to_string(),
                };
                tracing::warn!(
                    target: "fanout",
                    %topic,
                    destination = %dest,
                    error = %reason,
                    "delivery failed"
                );
                counter!("delivery_failures_total", "topic" => topic.to_string()).increment(1);
                if health.record_failure(topic, &dest) {
                    registry.unsubscribe(topic, &dest);
                    counter!("destinations_dropped_total").increment(1);
                    tracing::warn!(target: "fanout", %topic, destination = %dest, "destination dropped after repeated failures");
                    report.dropped.push(dest.clone());
                }
                report.failed.push(dest);
            }
        }
    }
    report
}
