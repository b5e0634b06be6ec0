//! Single normalization boundary between SWPC JSON and canonical records.
//!
//! Upstream payloads drift: fields go missing, change name (`max_class` vs
//! `current_class`), switch between string and number, and occasionally the
//! whole document arrives as newline-delimited JSON. All of that is absorbed
//! here so the rest of the crate only sees `FlareRecord`, `ForecastEntry` and
//! `AlertRecord`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{AlertRecord, FlareRecord, ForecastEntry};
use super::FeedError;

const FORECAST_DAYS: usize = 3;
const ALERT_TERMS: [&str; 3] = ["flare", "x-ray", "xray"];
const ALERT_HEADINGS: [&str; 4] = ["ALERT:", "WARNING:", "WATCH:", "SUMMARY:"];

/// Decode a body as JSON, falling back to newline-delimited JSON.
pub fn decode_payload(text: &str) -> Result<Value, FeedError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FeedError::Empty);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => Ok(v),
        Err(first) => {
            let mut rows = Vec::new();
            for line in trimmed.lines().filter(|l| !l.trim().is_empty()) {
                let row = serde_json::from_str::<Value>(line)
                    .map_err(|_| FeedError::Malformed(format!("not JSON or NDJSON: {first}")))?;
                rows.push(row);
            }
            Ok(Value::Array(rows))
        }
    }
}

/// Parse an upstream timestamp. Naive forms are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_end_matches("UTC").trim();
    if s.is_empty() || s.eq_ignore_ascii_case("unknown") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.trim_end_matches('Z');
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    None
}

/// Calendar date from either `2025-01-10` or a full timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    })
}

fn percent(v: &Option<Value>) -> u8 {
    let raw = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(0)
}

#[derive(Debug, Default, Deserialize)]
struct RawFlare {
    #[serde(default, deserialize_with = "lenient_string")]
    max_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    current_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    begin_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    begin_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    max_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    time_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    satellite: Option<String>,
}

impl From<RawFlare> for FlareRecord {
    fn from(r: RawFlare) -> Self {
        let ts = |s: &Option<String>| s.as_deref().and_then(parse_timestamp);
        FlareRecord {
            begin_time: ts(&r.begin_time),
            peak_time: ts(&r.max_time),
            end_time: ts(&r.end_time),
            observed_at: ts(&r.time_tag),
            class_label: r.max_class.or(r.current_class),
            begin_class: r.begin_class,
            end_class: r.end_class,
            satellite_id: r.satellite.unwrap_or_else(|| "GOES".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawForecast {
    #[serde(default, deserialize_with = "lenient_string")]
    date: Option<String>,
    #[serde(default)]
    m_class_1_day: Option<Value>,
    #[serde(default)]
    m_class_2_day: Option<Value>,
    #[serde(default)]
    m_class_3_day: Option<Value>,
    #[serde(default)]
    x_class_1_day: Option<Value>,
    #[serde(default)]
    x_class_2_day: Option<Value>,
    #[serde(default)]
    x_class_3_day: Option<Value>,
}

impl RawForecast {
    fn into_entry(self) -> Option<ForecastEntry> {
        let date = self.date.as_deref().and_then(parse_date)?;
        Some(ForecastEntry {
            date,
            m_class_pct: [
                percent(&self.m_class_1_day),
                percent(&self.m_class_2_day),
                percent(&self.m_class_3_day),
            ],
            x_class_pct: [
                percent(&self.x_class_1_day),
                percent(&self.x_class_2_day),
                percent(&self.x_class_3_day),
            ],
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAlert {
    #[serde(default, deserialize_with = "lenient_string")]
    message_type: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    issue_datetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    time_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    product_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    regions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    affected_areas: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    product_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
}

impl From<RawAlert> for AlertRecord {
    fn from(r: RawAlert) -> Self {
        let body = r
            .message
            .or(r.summary)
            .or(r.product_text)
            .unwrap_or_default();
        let kind = r
            .message_type
            .or(r.kind)
            .or_else(|| heading_of(&body))
            .unwrap_or_else(|| "SWPC Alert".to_string());
        let issued_at = [r.issue_datetime, r.time_tag, r.timestamp]
            .into_iter()
            .flatten()
            .find_map(|s| parse_timestamp(&s));
        let region_ids = if r.regions.is_empty() {
            r.affected_areas
        } else {
            r.regions
        };
        AlertRecord {
            kind,
            issued_at,
            body,
            region_ids,
            source_id: r.product_id.or(r.id),
        }
    }
}

/// SWPC products carry no type field; their first `ALERT:`-style line names them.
fn heading_of(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|l| ALERT_HEADINGS.iter().any(|h| l.starts_with(h)))
        .map(str::to_string)
}

fn expect_rows(payload: Value) -> Result<Vec<Value>, FeedError> {
    match payload {
        Value::Array(rows) if rows.is_empty() => Err(FeedError::Empty),
        Value::Array(rows) => Ok(rows),
        other => Err(FeedError::Malformed(format!(
            "expected a list, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Latest flare is the first element of the list.
pub fn latest_flare(payload: Value) -> Result<FlareRecord, FeedError> {
    let first = expect_rows(payload)?
        .into_iter()
        .next()
        .ok_or(FeedError::Empty)?;
    if !first.is_object() {
        return Err(FeedError::Malformed(format!(
            "flare row is a {}",
            kind_of(&first)
        )));
    }
    let raw: RawFlare =
        serde_json::from_value(first).map_err(|e| FeedError::Malformed(e.to_string()))?;
    Ok(raw.into())
}

/// First three forecast rows; rows without a usable date are dropped.
pub fn forecast(payload: Value) -> Result<Vec<ForecastEntry>, FeedError> {
    Ok(expect_rows(payload)?
        .into_iter()
        .take(FORECAST_DAYS)
        .filter_map(|row| serde_json::from_value::<RawForecast>(row).ok())
        .filter_map(RawForecast::into_entry)
        .collect())
}

/// Flare/x-ray alerts only, keeping the `limit` most recent (list order).
pub fn flare_alerts(payload: Value, limit: usize) -> Result<Vec<AlertRecord>, FeedError> {
    let mut out: Vec<AlertRecord> = expect_rows(payload)?
        .into_iter()
        .filter_map(|row| serde_json::from_value::<RawAlert>(row).ok())
        .map(AlertRecord::from)
        .filter(|a| mentions_flare(&a.body))
        .collect();
    let start = out.len().saturating_sub(limit);
    Ok(out.split_off(start))
}

pub fn mentions_flare(body: &str) -> bool {
    let lower = body.to_lowercase();
    ALERT_TERMS.iter().any(|t| lower.contains(t))
}
