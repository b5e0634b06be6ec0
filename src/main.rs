//! Solar Flare Bridge: Binary Entrypoint
//! Loads config, starts the poll, digest and status loops and serves the command API.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solar_flare_bridge::api::{create_router, AppState};
use solar_flare_bridge::bridge::Bridge;
use solar_flare_bridge::config::BridgeConfig;
use solar_flare_bridge::feed::SwpcClient;
use solar_flare_bridge::metrics::Metrics;
use solar_flare_bridge::notify::notifier_from_config;
use solar_flare_bridge::scheduler::spawn_all;

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
/// `try_init` so a subscriber installed by the platform is left alone.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("solar_flare_bridge=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BridgeConfig::load_default().context("loading bridge config")?;
    // Missing chat credential aborts startup here.
    let notifier = notifier_from_config(&cfg)?;
    let feed = SwpcClient::new(cfg.endpoints.clone(), cfg.fetch_timeout())?;

    let metrics = Metrics::init(&cfg)?;
    tracing::info!(
        platform = notifier.name(),
        timezone = %cfg.timezone,
        digest_hour = cfg.digest_hour,
        "starting solar flare bridge"
    );

    let bridge = Arc::new(Bridge::new(cfg, Arc::new(feed), notifier)?);
    let schedulers = spawn_all(Arc::clone(&bridge));

    let state = AppState {
        bridge,
        poller: schedulers.poll,
        status: schedulers.status,
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
