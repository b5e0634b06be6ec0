// src/scheduler/status.rs
//! Status board: a one-line summary of the latest flare and today's M/X odds,
//! refreshed on its own interval so readers never wait on the feed.

use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::bridge::Bridge;
use crate::notify::format;

pub struct StatusBoard {
    bridge: Arc<Bridge>,
    current: RwLock<Option<String>>,
}

impl StatusBoard {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            current: RwLock::new(None),
        }
    }

    /// Last computed line; `None` until the first refresh finishes.
    pub fn current(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Fetch flare and forecast, rebuild the line and store it.
    pub async fn refresh(&self) -> String {
        let feed = &self.bridge.feed;
        let (flare, forecast) = tokio::join!(feed.latest_flare(), feed.forecast());
        let line = format::status_line(flare.as_ref(), forecast.first());

        let mut slot = self.current.write().unwrap_or_else(|p| p.into_inner());
        if slot.as_deref() != Some(line.as_str()) {
            tracing::info!(target: "status", status = %line, "status line updated");
        } else {
            tracing::debug!(target: "status", "status line unchanged");
        }
        *slot = Some(line.clone());
        line
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.bridge.cfg.status_refresh_interval();
        tokio::spawn(async move {
            tracing::info!(
                target: "status",
                interval_secs = period.as_secs(),
                "status refresh started"
            );
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        })
    }
}
