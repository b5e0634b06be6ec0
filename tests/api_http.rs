// tests/api_http.rs
//
// HTTP-level tests for the command Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /commands (queries, subscriptions, bad input)
// - GET /subscriptions
// - GET /status
// - POST /admin/poll

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use solar_flare_bridge::api::{create_router, AppState};
use solar_flare_bridge::bridge::Bridge;
use solar_flare_bridge::config::{BridgeConfig, Platform};
use solar_flare_bridge::feed::SwpcClient;
use solar_flare_bridge::notify::log::LogNotifier;
use solar_flare_bridge::scheduler::{PollScheduler, StatusBoard};

const BODY_LIMIT: usize = 1024 * 1024;

const FLARE_JSON: &str = include_str!("fixtures/xray_flares_latest.json");
const FORECAST_JSON: &str = include_str!("fixtures/solar_probabilities.json");
const ALERTS_JSON: &str = include_str!("fixtures/alerts.json");

fn test_app(feed: SwpcClient) -> Router {
    let cfg = BridgeConfig {
        platform: Platform::Log,
        ..BridgeConfig::default()
    };
    let bridge = Arc::new(Bridge::new(cfg, Arc::new(feed), Arc::new(LogNotifier)).unwrap());
    let poller = Arc::new(PollScheduler::new(Arc::clone(&bridge)));
    let status = Arc::new(StatusBoard::new(Arc::clone(&bridge)));
    create_router(AppState {
        bridge,
        poller,
        status,
    })
}

fn fixture_app() -> Router {
    test_app(SwpcClient::from_fixtures(
        FLARE_JSON,
        FORECAST_JSON,
        ALERTS_JSON,
    ))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

fn command(payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/commands")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /commands")
}

#[tokio::test]
async fn health_is_ok() {
    let app = fixture_app();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn flare_latest_returns_rendered_message() {
    let app = fixture_app();
    let (status, v) = send(&app, command(json!({"command": "flare_latest"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["kind"], "messages");
    let msg = &v["body"][0];
    assert_eq!(msg["severity"], "red");
    let peak = msg["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "Peak Class")
        .expect("Peak Class field");
    assert_eq!(peak["value"], "X2.5");
    assert!(msg["image_url"]
        .as_str()
        .unwrap()
        .ends_with("latest_193.jpg"));
}

#[tokio::test]
async fn empty_feed_yields_text_replies() {
    let app = test_app(SwpcClient::from_fixtures("[]", "[]", "[]"));
    let (_, v) = send(&app, command(json!({"command": "flare_latest"}))).await;
    assert_eq!(v, json!({"kind": "text", "body": "No flare data available."}));

    let (_, v) = send(&app, command(json!({"command": "flare_alerts", "limit": 3}))).await;
    assert_eq!(v["kind"], "text");

    let (_, v) = send(&app, command(json!({"command": "status"}))).await;
    assert_eq!(v["body"], "Current Flare: None | M: 0% | X: 0%");
}

#[tokio::test]
async fn alerts_limit_is_clamped() {
    let app = fixture_app();
    let (_, v) = send(&app, command(json!({"command": "flare_alerts", "limit": 0}))).await;
    assert_eq!(v["body"].as_array().map(Vec::len), Some(1));

    let (_, v) = send(&app, command(json!({"command": "flare_alerts", "limit": 99}))).await;
    assert_eq!(v["body"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn unsupported_wavelength_is_rejected_with_text() {
    let app = fixture_app();
    let (_, v) = send(
        &app,
        command(json!({"command": "latest_image", "wavelength": 999})),
    )
    .await;
    assert_eq!(v["kind"], "text");
    assert!(v["body"].as_str().unwrap().contains("Unsupported wavelength"));
}

#[tokio::test]
async fn subscriptions_round_trip() {
    let app = fixture_app();
    let sub = json!({"command": "subscribe_flares", "destination": "123"});
    let (_, v) = send(&app, command(sub.clone())).await;
    assert!(v["body"].as_str().unwrap().starts_with("✅ Subscribed"));
    let (_, v) = send(&app, command(sub)).await;
    assert!(v["body"].as_str().unwrap().contains("already subscribed"));
    let padded = json!({"command": "subscribe_flares", "destination": "  123 "});
    let (_, v) = send(&app, command(padded)).await;
    assert!(v["body"].as_str().unwrap().contains("already subscribed"));

    let (_, v) = send(
        &app,
        command(json!({"command": "subscribe_daily", "destination": "456"})),
    )
    .await;
    assert!(v["body"].as_str().unwrap().contains("17:00 America/New_York"));

    let req = Request::builder()
        .uri("/subscriptions")
        .body(Body::empty())
        .unwrap();
    let (status, v) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!({"flares": ["123"], "digest": ["456"]}));

    let (_, v) = send(
        &app,
        command(json!({"command": "unsubscribe_flares", "destination": "999"})),
    )
    .await;
    assert!(v["body"].as_str().unwrap().contains("isn't subscribed"));
}

#[tokio::test]
async fn unknown_command_is_a_client_error() {
    let app = fixture_app();
    let req = command(json!({"command": "launch_rockets"}));
    let resp = app.oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn admin_poll_runs_one_cycle() {
    let app = fixture_app();
    send(
        &app,
        command(json!({"command": "subscribe_flares", "destination": "ops"})),
    )
    .await;

    let poll = || {
        Request::builder()
            .method("POST")
            .uri("/admin/poll")
            .body(Body::empty())
            .unwrap()
    };
    let (status, v) = send(&app, poll()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!({"outcome": "notified", "delivered": 1, "failed": 0}));

    let (_, v) = send(&app, poll()).await;
    assert_eq!(v["outcome"], "already_seen");
}

#[tokio::test]
async fn status_route_serves_the_status_line() {
    let app = fixture_app();
    let get = || Request::builder().uri("/status").body(Body::empty()).unwrap();

    // Nothing refreshed yet: the route computes the line itself.
    let (status, v) = send(&app, get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!({"status": "Current Flare: X2.5 | M: 42% | X: 10%"}));

    let (_, again) = send(&app, get()).await;
    assert_eq!(again, v);
}
