// tests/feed_fixtures.rs
//
// SwpcClient in fixture mode: the same normalize path the HTTP mode uses,
// fed with captured SWPC bodies.

use chrono::{NaiveDate, TimeZone, Utc};
use solar_flare_bridge::classify::ClassLetter;
use solar_flare_bridge::dedup::FlareEventId;
use solar_flare_bridge::feed::{FeedSource, SwpcClient};

const FLARE_JSON: &str = include_str!("fixtures/xray_flares_latest.json");
const FORECAST_JSON: &str = include_str!("fixtures/solar_probabilities.json");
const ALERTS_JSON: &str = include_str!("fixtures/alerts.json");

fn client() -> SwpcClient {
    SwpcClient::from_fixtures(FLARE_JSON, FORECAST_JSON, ALERTS_JSON)
}

#[tokio::test]
async fn latest_flare_uses_peak_class_and_time() {
    let f = client().latest_flare().await.expect("flare from fixture");
    assert_eq!(f.class_label.as_deref(), Some("X2.5"));
    assert_eq!(f.begin_class.as_deref(), Some("C8.4"));
    assert_eq!(f.end_class.as_deref(), Some("M1.2"));
    assert_eq!(f.satellite_id, "16");
    assert_eq!(
        f.peak_time,
        Some(Utc.with_ymd_and_hms(2025, 1, 10, 14, 32, 0).unwrap())
    );

    let id = FlareEventId::of(&f).expect("id");
    assert_eq!(id.letter, ClassLetter::X);
    assert_eq!(id.to_string(), "2025-01-10T14:32:00Z_X");
}

#[tokio::test]
async fn forecast_keeps_first_three_days() {
    let rows = client().forecast().await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
    assert_eq!(rows[0].m_class_pct, [42, 40, 35]);
    assert_eq!(rows[0].x_class_pct, [10, 10, 5]);
    assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2025, 1, 12).unwrap());
}

#[tokio::test]
async fn alerts_are_filtered_to_flare_products_and_tail_limited() {
    let all = client().alerts(10).await;
    assert_eq!(all.len(), 3, "geomagnetic warning must be filtered out");
    assert!(all[0].kind.starts_with("SUMMARY: X-ray Event exceeded X1"));
    assert_eq!(all[0].source_id.as_deref(), Some("XMF"));
    assert_eq!(
        all[0].issued_at,
        Some(Utc.with_ymd_and_hms(2025, 1, 10, 14, 45, 0).unwrap())
    );

    let tail = client().alerts(2).await;
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].kind, "ALERT: X-Ray Flux exceeded M5");
    assert!(tail[1].kind.starts_with("SUMMARY: X-ray Event exceeded M5"));
}

#[tokio::test]
async fn broken_bodies_degrade_to_empty_values() {
    let c = SwpcClient::from_fixtures("", "{\"not\":\"a list\"}", "[]");
    assert!(c.latest_flare().await.is_none());
    assert!(c.forecast().await.is_empty());
    assert!(c.alerts(5).await.is_empty());
}

#[tokio::test]
async fn ndjson_flare_body_is_accepted() {
    let body = "{\"max_class\":\"M1.4\",\"max_time\":\"2025-01-10T08:00:00Z\"}\n\
                {\"max_class\":\"C2.0\",\"max_time\":\"2025-01-10T06:00:00Z\"}\n";
    let c = SwpcClient::from_fixtures(body, "[]", "[]");
    let f = c.latest_flare().await.expect("first ndjson row");
    assert_eq!(f.class().map(|c| c.letter), Some(ClassLetter::M));
}
