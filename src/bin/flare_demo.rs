//! Demo: one poll cycle and one forced digest against the live SWPC feed,
//! delivered to the log instead of a chat platform.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use solar_flare_bridge::bridge::Bridge;
use solar_flare_bridge::config::{BridgeConfig, Platform};
use solar_flare_bridge::feed::SwpcClient;
use solar_flare_bridge::notify::log::LogNotifier;
use solar_flare_bridge::registry::{Destination, Topic};
use solar_flare_bridge::scheduler::{DigestScheduler, PollScheduler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = BridgeConfig {
        platform: Platform::Log,
        ..BridgeConfig::default()
    };
    let feed = SwpcClient::new(cfg.endpoints.clone(), cfg.fetch_timeout())?;
    let bridge = Arc::new(Bridge::new(cfg, Arc::new(feed), Arc::new(LogNotifier))?);

    let dest = Destination::new("demo");
    bridge.registry.subscribe(Topic::Flares, dest.clone());
    bridge.registry.subscribe(Topic::Digest, dest);

    let poll = PollScheduler::new(Arc::clone(&bridge));
    let outcome = poll.run_cycle().await;
    println!("poll cycle: {}", outcome.label());

    let digest = DigestScheduler::new(Arc::clone(&bridge));
    let now = Utc::now();
    let today = now.with_timezone(&bridge.tz).date_naive();
    let report = digest.send(today, now).await;
    println!("digest: delivered to {} destination(s)", report.delivered.len());

    println!("flare-demo done");
    Ok(())
}
