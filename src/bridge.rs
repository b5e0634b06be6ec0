//! # Bridge
//! The running service instance: owns every piece of process-local state
//! (subscriptions, seen events, flare history, delivery health) and the two
//! external collaborators (feed + notifier). Schedulers and the command
//! surface share it through an `Arc`.

use anyhow::Result;
use chrono_tz::Tz;
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::dedup::SeenEvents;
use crate::feed::FeedSource;
use crate::history::FlareHistory;
use crate::notify::{DeliveryHealth, Notifier};
use crate::registry::SubscriptionRegistry;

pub struct Bridge {
    pub cfg: BridgeConfig,
    pub tz: Tz,
    pub feed: Arc<dyn FeedSource>,
    pub notifier: Arc<dyn Notifier>,
    pub registry: SubscriptionRegistry,
    pub seen: SeenEvents,
    pub history: FlareHistory,
    pub health: DeliveryHealth,
}

impl Bridge {
    /// Fails only on an invalid time zone.
    pub fn new(
        cfg: BridgeConfig,
        feed: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let tz = cfg.tz()?;
        Ok(Self {
            tz,
            feed,
            notifier,
            registry: SubscriptionRegistry::new(),
            seen: SeenEvents::new(),
            history: FlareHistory::with_capacity(cfg.history_capacity),
            health: DeliveryHealth::new(cfg.max_delivery_failures),
            cfg,
        })
    }
}
