//! # Subscription Registry
//! Which chat destinations receive flare alerts and which receive the daily
//! digest. Two independent sets, each behind its own lock; every operation is
//! a single insert/remove/clone so no lock is ever held across an `.await`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Opaque chat channel/thread handle (Discord channel id, Slack channel id, ...).
/// Ids arriving over the command API go through `new`, so they are trimmed too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Destination(String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Destination {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Destination> for String {
    fn from(d: Destination) -> Self {
        d.0
    }
}

/// The two subscription kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Flares,
    Digest,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Flares => f.write_str("flares"),
            Topic::Digest => f.write_str("digest"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    flares: RwLock<BTreeSet<Destination>>,
    digest: RwLock<BTreeSet<Destination>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `d` was not subscribed before.
    pub fn subscribe(&self, topic: Topic, d: Destination) -> bool {
        let added = self.write(topic).insert(d.clone());
        if added {
            tracing::info!(target: "registry", %topic, destination = %d, "subscribed");
        }
        added
    }

    /// Returns `true` if `d` was subscribed. Removing a non-member is a no-op.
    pub fn unsubscribe(&self, topic: Topic, d: &Destination) -> bool {
        let removed = self.write(topic).remove(d);
        if removed {
            tracing::info!(target: "registry", %topic, destination = %d, "unsubscribed");
        }
        removed
    }

    pub fn is_subscribed(&self, topic: Topic, d: &Destination) -> bool {
        self.read(topic).contains(d)
    }

    /// Point-in-time copy; later mutations do not affect it.
    pub fn targets(&self, topic: Topic) -> Vec<Destination> {
        self.read(topic).iter().cloned().collect()
    }

    pub fn has_targets(&self, topic: Topic) -> bool {
        !self.read(topic).is_empty()
    }

    pub fn subscribe_flares(&self, d: Destination) -> bool {
        self.subscribe(Topic::Flares, d)
    }

    pub fn unsubscribe_flares(&self, d: &Destination) -> bool {
        self.unsubscribe(Topic::Flares, d)
    }

    pub fn subscribe_digest(&self, d: Destination) -> bool {
        self.subscribe(Topic::Digest, d)
    }

    pub fn unsubscribe_digest(&self, d: &Destination) -> bool {
        self.unsubscribe(Topic::Digest, d)
    }

    pub fn flare_targets(&self) -> Vec<Destination> {
        self.targets(Topic::Flares)
    }

    pub fn digest_targets(&self) -> Vec<Destination> {
        self.targets(Topic::Digest)
    }

    fn set(&self, topic: Topic) -> &RwLock<BTreeSet<Destination>> {
        match topic {
            Topic::Flares => &self.flares,
            Topic::Digest => &self.digest,
        }
    }

    fn read(&self, topic: Topic) -> RwLockReadGuard<'_, BTreeSet<Destination>> {
        self.set(topic).read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self, topic: Topic) -> RwLockWriteGuard<'_, BTreeSet<Destination>> {
        self.set(topic).write().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribing_twice_is_idempotent() {
        let reg = SubscriptionRegistry::new();
        assert!(reg.subscribe_flares("123".into()));
        assert!(!reg.subscribe_flares("123".into()));
        assert_eq!(reg.flare_targets(), vec![Destination::new("123")]);
    }

    #[test]
    fn unsubscribing_a_stranger_reports_not_subscribed() {
        let reg = SubscriptionRegistry::new();
        assert!(!reg.unsubscribe_digest(&"nope".into()));
        assert!(reg.digest_targets().is_empty());
    }

    #[test]
    fn topics_are_independent() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe_flares("a".into());
        reg.subscribe_digest("b".into());
        assert!(reg.is_subscribed(Topic::Flares, &"a".into()));
        assert!(!reg.is_subscribed(Topic::Digest, &"a".into()));
        assert!(reg.unsubscribe_flares(&"a".into()));
        assert!(!reg.has_targets(Topic::Flares));
        assert!(reg.has_targets(Topic::Digest));
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe_flares("a".into());
        let snap = reg.flare_targets();
        reg.subscribe_flares("b".into());
        reg.unsubscribe_flares(&"a".into());
        assert_eq!(snap, vec![Destination::new("a")]);
    }

    #[test]
    fn destination_ids_are_trimmed() {
        assert_eq!(Destination::new(" C0123 "), Destination::new("C0123"));
    }

    #[test]
    fn deserialized_ids_are_trimmed_like_constructed_ones() {
        let d: Destination = serde_json::from_str("\" C0123 \"").unwrap();
        assert_eq!(d, Destination::new("C0123"));
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"C0123\"");

        let reg = SubscriptionRegistry::new();
        assert!(reg.subscribe_flares("C0123".into()));
        assert!(!reg.subscribe_flares(d), "padded id must not become a second member");
        assert!(reg.unsubscribe_flares(&"C0123".into()));
        assert!(!reg.has_targets(Topic::Flares));
    }
}
