use std::sync::Arc;

use chrono::Utc;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::bridge::Bridge;
use crate::commands::{self, Command, Reply};
use crate::registry::{Destination, Topic};
use crate::scheduler::{PollOutcome, PollScheduler, StatusBoard};

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub poller: Arc<PollScheduler>,
    pub status: Arc<StatusBoard>,
}

/// Command + admin surface. `/metrics` is merged in by the entrypoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/commands", post(run_command))
        .route("/subscriptions", get(list_subscriptions))
        .route("/status", get(current_status))
        .route("/admin/poll", post(admin_poll))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn run_command(State(state): State<AppState>, Json(cmd): Json<Command>) -> Json<Reply> {
    Json(commands::handle(&state.bridge, cmd, Utc::now()).await)
}

#[derive(serde::Serialize)]
struct SubscriptionsOut {
    flares: Vec<Destination>,
    digest: Vec<Destination>,
}

async fn list_subscriptions(State(state): State<AppState>) -> Json<SubscriptionsOut> {
    Json(SubscriptionsOut {
        flares: state.bridge.registry.targets(Topic::Flares),
        digest: state.bridge.registry.targets(Topic::Digest),
    })
}

#[derive(serde::Serialize)]
struct StatusOut {
    status: String,
}

/// Cached status line; computed on the spot before the first scheduled refresh.
async fn current_status(State(state): State<AppState>) -> Json<StatusOut> {
    let status = match state.status.current() {
        Some(line) => line,
        None => state.status.refresh().await,
    };
    Json(StatusOut { status })
}

#[derive(serde::Serialize)]
struct PollOut {
    outcome: &'static str,
    delivered: usize,
    failed: usize,
}

/// Run one poll cycle now; 409 if a cycle is already in flight.
async fn admin_poll(State(state): State<AppState>) -> (StatusCode, Json<PollOut>) {
    let outcome = state.poller.run_cycle().await;
    let (delivered, failed) = match &outcome {
        PollOutcome::Notified { report, .. } => {
            (report.delivered.len(), report.failed.len())
        }
        _ => (0, 0),
    };
    let status = if outcome == PollOutcome::Busy {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(PollOut {
            outcome: outcome.label(),
            delivered,
            failed,
        }),
    )
}
