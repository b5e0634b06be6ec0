//! On-demand commands issued from a chat platform.
//!
//! Each variant maps to one core query or subscription call and yields either
//! rendered messages or a plain-text reply. "No data" is a normal reply, not
//! an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bridge::Bridge;
use crate::notify::format::{self, AIA_WAVELENGTHS, DEFAULT_WAVELENGTH};
use crate::notify::StructuredMessage;
use crate::registry::{Destination, Topic};

pub const ALERTS_MIN: i64 = 1;
pub const ALERTS_MAX: i64 = 10;
const ALERTS_DEFAULT: i64 = 5;

fn default_alerts_limit() -> i64 {
    ALERTS_DEFAULT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    FlareLatest,
    FlareForecast,
    FlareAlerts {
        #[serde(default = "default_alerts_limit")]
        limit: i64,
    },
    LatestImage {
        #[serde(default)]
        wavelength: Option<u16>,
    },
    LatestForecast,
    LatestFlareClass,
    Status,
    SubscribeFlares {
        destination: Destination,
    },
    UnsubscribeFlares {
        destination: Destination,
    },
    SubscribeDaily {
        destination: Destination,
    },
    UnsubscribeDaily {
        destination: Destination,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Reply {
    Messages(Vec<StructuredMessage>),
    Text(String),
}

impl Reply {
    fn one(msg: StructuredMessage) -> Self {
        Reply::Messages(vec![msg])
    }

    fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

pub async fn handle(bridge: &Bridge, cmd: Command, now: DateTime<Utc>) -> Reply {
    let tz = bridge.tz;
    match cmd {
        Command::FlareLatest => match bridge.feed.latest_flare().await {
            Some(f) => Reply::one(format::flare_message(&f, tz, now)),
            None => Reply::text("No flare data available."),
        },
        Command::FlareForecast => {
            let rows = bridge.feed.forecast().await;
            if rows.is_empty() {
                return Reply::text("No forecast data available.");
            }
            Reply::one(format::forecast_message(&rows, tz, now))
        }
        Command::FlareAlerts { limit } => {
            let limit = limit.clamp(ALERTS_MIN, ALERTS_MAX) as usize;
            let items = bridge.feed.alerts(limit).await;
            if items.is_empty() {
                return Reply::text("No flare alerts found.");
            }
            Reply::Messages(
                items
                    .iter()
                    .map(|a| format::alert_message(a, tz, now))
                    .collect(),
            )
        }
        Command::LatestImage { wavelength } => {
            let w = wavelength.unwrap_or(DEFAULT_WAVELENGTH);
            if !AIA_WAVELENGTHS.contains(&w) {
                let choices = AIA_WAVELENGTHS.map(|w| w.to_string()).join(", ");
                return Reply::text(format!(
                    "Unsupported wavelength {w} Å. Choose one of: {choices}."
                ));
            }
            let flare_time = bridge
                .feed
                .latest_flare()
                .await
                .and_then(|f| f.event_time());
            Reply::one(format::image_message(w, flare_time, tz, now))
        }
        Command::LatestForecast => match bridge.feed.forecast().await.first() {
            Some(row) => Reply::one(format::latest_forecast_message(row, tz, now)),
            None => Reply::text("No forecast data available."),
        },
        Command::LatestFlareClass => match bridge.feed.latest_flare().await {
            Some(f) => Reply::one(format::flare_class_message(&f, tz, now)),
            None => Reply::text("No flare data available."),
        },
        Command::Status => {
            let flare = bridge.feed.latest_flare().await;
            let forecast = bridge.feed.forecast().await;
            Reply::text(format::status_line(flare.as_ref(), forecast.first()))
        }
        Command::SubscribeFlares { destination } => {
            if bridge.registry.subscribe(Topic::Flares, destination) {
                Reply::text("✅ Subscribed: I'll notify you when M- or X-class flares are detected!")
            } else {
                Reply::text("This channel is already subscribed for flare notifications.")
            }
        }
        Command::UnsubscribeFlares { destination } => {
            if bridge.registry.unsubscribe(Topic::Flares, &destination) {
                Reply::text("Unsubscribed from flare notifications.")
            } else {
                Reply::text("This channel isn't subscribed for flare notifications.")
            }
        }
        Command::SubscribeDaily { destination } => {
            if bridge.registry.subscribe(Topic::Digest, destination) {
                Reply::text(format!(
                    "✅ Subscribed: I'll post a daily summary at {:02}:00 {} with today's forecast and events!",
                    bridge.cfg.digest_hour,
                    tz.name()
                ))
            } else {
                Reply::text("This channel is already subscribed for daily summaries.")
            }
        }
        Command::UnsubscribeDaily { destination } => {
            if bridge.registry.unsubscribe(Topic::Digest, &destination) {
                Reply::text("Unsubscribed from daily summaries.")
            } else {
                Reply::text("This channel isn't subscribed for daily summaries.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_deserialize_with_defaults() {
        let c: Command = serde_json::from_str(r#"{"command":"flare_alerts"}"#).unwrap();
        assert_eq!(c, Command::FlareAlerts { limit: 5 });
        let c: Command =
            serde_json::from_str(r#"{"command":"subscribe_flares","destination":"123"}"#).unwrap();
        assert_eq!(
            c,
            Command::SubscribeFlares {
                destination: Destination::new("123")
            }
        );
        let c: Command = serde_json::from_str(r#"{"command":"latest_image"}"#).unwrap();
        assert_eq!(c, Command::LatestImage { wavelength: None });
    }

    #[test]
    fn reply_is_tagged() {
        let v = serde_json::to_value(Reply::text("hi")).unwrap();
        assert_eq!(v["kind"], "text");
        assert_eq!(v["body"], "hi");
    }
}
