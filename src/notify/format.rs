//! Builders that turn feed records into `StructuredMessage`s.
//!
//! All builders take the display zone and "now" explicitly so output is
//! deterministic under test.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::StructuredMessage;
use crate::classify::{classify, ClassLetter, Severity};
use crate::feed::{AlertRecord, FlareRecord, ForecastEntry};

pub const SDO_LATEST: &str = "https://sdo.gsfc.nasa.gov/assets/img/latest/";
/// AIA channels published on the SDO "latest" page, in Ångström.
pub const AIA_WAVELENGTHS: [u16; 7] = [94, 131, 171, 193, 211, 304, 335];
pub const DEFAULT_WAVELENGTH: u16 = 193;
const ALERT_BODY_MAX: usize = 3800;
const STATUS_MAX: usize = 128;

pub fn sdo_image_url(wavelength: u16) -> String {
    format!("{SDO_LATEST}latest_{wavelength}.jpg")
}

/// `2025-01-10 14:32 UTC / 2025-01-10 09:32 EST`, or `Unknown`.
pub fn fmt_time(t: Option<DateTime<Utc>>, tz: Tz) -> String {
    match t {
        Some(t) => format!(
            "{} / {}",
            t.format("%Y-%m-%d %H:%M UTC"),
            t.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
        ),
        None => "Unknown".to_string(),
    }
}

pub fn footer(now: DateTime<Utc>, tz: Tz, label: &str) -> String {
    format!(
        "{label} • {} / {}",
        now.format("%Y-%m-%d %H:%M UTC"),
        now.with_timezone(&tz).format("%H:%M %Z")
    )
}

fn letter_of(label: Option<&str>) -> Option<ClassLetter> {
    label.and_then(classify).map(|c| c.letter)
}

fn evolution(f: &FlareRecord) -> String {
    format!(
        "{} → {} → {}",
        f.begin_class.as_deref().unwrap_or("Unknown"),
        f.class_or_unknown(),
        f.end_class.as_deref().unwrap_or("Unknown")
    )
}

/// Full flare notification; also used for the on-demand "latest flare" query.
pub fn flare_message(f: &FlareRecord, tz: Tz, now: DateTime<Utc>) -> StructuredMessage {
    let letter = f.class().map(|c| c.letter);
    let title = match letter {
        Some(ClassLetter::X) => "🚨 X-Class Solar Flare Detected",
        Some(ClassLetter::M) => "⚠️ M-Class Solar Flare Detected",
        _ => "Solar Flare Event",
    };
    let mut msg = StructuredMessage::new(title, Severity::for_letter(letter))
        .inline_field("Peak Class", f.class_or_unknown())
        .inline_field("Satellite", format!("GOES-{}", f.satellite_id.trim_start_matches("GOES-")))
        .field("Begin", fmt_time(f.begin_time, tz))
        .inline_field("Peak Time", fmt_time(f.peak_time, tz))
        .inline_field("End", fmt_time(f.end_time, tz));

    if f.begin_class.is_some() && f.begin_class != f.class_label {
        msg = msg.field("Class Evolution", evolution(f));
    }

    msg.field(
        format!("SDO AIA {DEFAULT_WAVELENGTH}Å"),
        "[View on SDO](https://sdo.gsfc.nasa.gov/)",
    )
    .image(sdo_image_url(DEFAULT_WAVELENGTH))
    .footer(footer(now, tz, "SWPC"))
}

/// Compact "latest flare class" card.
pub fn flare_class_message(f: &FlareRecord, tz: Tz, now: DateTime<Utc>) -> StructuredMessage {
    let letter = f.class().map(|c| c.letter);
    let emoji = match letter {
        Some(ClassLetter::X) => "🚨",
        Some(ClassLetter::M) => "⚠️",
        Some(ClassLetter::C) => "⚡",
        _ => "☀️",
    };
    let class = f.class_or_unknown();
    let mut msg = StructuredMessage::new(
        format!("{emoji} Latest Flare Class: {class}"),
        Severity::for_letter(letter),
    )
    .inline_field("Peak Class", class)
    .inline_field("Peak Time", fmt_time(f.peak_time.or(f.observed_at), tz));

    let differs = |other: &Option<String>| other.is_some() && *other != f.class_label;
    if differs(&f.begin_class) || differs(&f.end_class) {
        msg = msg.field("Evolution", evolution(f));
    }
    msg.footer(footer(now, tz, "SWPC"))
}

/// 1-day M/X probabilities for each forecast day.
pub fn forecast_message(rows: &[ForecastEntry], tz: Tz, now: DateTime<Utc>) -> StructuredMessage {
    let mut lines = Vec::with_capacity(rows.len() * 3);
    for row in rows {
        lines.push(format!("**{}**", row.date.format("%Y-%m-%d")));
        lines.push(format!(
            "M-class: {}% | X-class: {}%",
            row.m_class_pct[0], row.x_class_pct[0]
        ));
        lines.push(String::new());
    }
    StructuredMessage::new("Solar Flare Probability Forecast", Severity::Orange)
        .description(lines.join("\n").trim_end().to_string())
        .footer(footer(now, tz, "SWPC"))
}

/// All six probabilities of one forecast row.
pub fn latest_forecast_message(
    row: &ForecastEntry,
    tz: Tz,
    now: DateTime<Utc>,
) -> StructuredMessage {
    let mut msg = StructuredMessage::new("Latest Solar Flare Forecast", Severity::Orange)
        .field("Date", row.date.format("%Y-%m-%d").to_string());
    for day in 0..3 {
        msg = msg
            .inline_field(
                format!("M-Class ({} day)", day + 1),
                format!("{}%", row.m_class_pct[day]),
            )
            .inline_field(
                format!("X-Class ({} day)", day + 1),
                format!("{}%", row.x_class_pct[day]),
            );
    }
    msg.footer(footer(now, tz, "SWPC"))
}

pub fn alert_severity(body: &str) -> Severity {
    let lower = body.to_lowercase();
    if lower.contains("x-class") || lower.contains("x class") {
        Severity::Red
    } else if lower.contains("m-class") || lower.contains("m class") {
        Severity::Orange
    } else {
        Severity::Blue
    }
}

fn truncate_body(body: &str) -> String {
    let text = body.trim();
    if text.chars().count() > ALERT_BODY_MAX {
        let head: String = text.chars().take(ALERT_BODY_MAX).collect();
        format!("{head}...")
    } else if text.is_empty() {
        "(no text)".to_string()
    } else {
        text.to_string()
    }
}

pub fn alert_message(a: &AlertRecord, tz: Tz, now: DateTime<Utc>) -> StructuredMessage {
    let mut msg = StructuredMessage::new(a.kind.clone(), alert_severity(&a.body))
        .description(truncate_body(&a.body));
    if a.issued_at.is_some() {
        msg = msg.inline_field("Issued", fmt_time(a.issued_at, tz));
    }
    if !a.region_ids.is_empty() {
        msg = msg.inline_field("Regions", a.region_ids.join(", "));
    }
    let stamp = footer(now, tz, "SWPC");
    match &a.source_id {
        Some(id) => msg.footer(format!("{id} • {stamp}")),
        None => msg.footer(stamp),
    }
}

pub fn image_message(
    wavelength: u16,
    flare_time: Option<DateTime<Utc>>,
    tz: Tz,
    now: DateTime<Utc>,
) -> StructuredMessage {
    let mut msg = StructuredMessage::new(format!("SDO AIA {wavelength}Å Solar Image"), Severity::Blue)
        .image(sdo_image_url(wavelength))
        .inline_field("Wavelength", format!("{wavelength} Å"));
    if flare_time.is_some() {
        msg = msg.inline_field("Time", fmt_time(flare_time, tz));
    }
    msg.field("Source", "[SDO/NASA](https://sdo.gsfc.nasa.gov/)")
        .footer(footer(now, tz, "SWPC"))
}

/// One-line presence text, shortened step by step to fit 128 characters.
pub fn status_line(flare: Option<&FlareRecord>, forecast: Option<&ForecastEntry>) -> String {
    let class = flare
        .and_then(|f| f.class_label.as_deref())
        .unwrap_or("None");
    let (m, x) = forecast
        .map(|r| (r.m_class_pct[0], r.x_class_pct[0]))
        .unwrap_or((0, 0));
    [
        format!("Current Flare: {class} | M: {m}% | X: {x}%"),
        format!("Flare: {class} | M: {m}% | X: {x}%"),
        format!("{class} | M:{m}% X:{x}%"),
        format!("Flare: {class}"),
    ]
    .into_iter()
    .find(|s| s.chars().count() <= STATUS_MAX)
    .unwrap_or_else(|| "Solar flares".to_string())
}

/// Everything the once-a-day summary shows for one local date.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestContent {
    pub date: NaiveDate,
    pub forecast: Option<ForecastEntry>,
    pub flares: Vec<FlareRecord>,
    pub alerts: Vec<AlertRecord>,
    pub alert_cap: usize,
}

pub fn digest_message(d: &DigestContent, tz: Tz, now: DateTime<Utc>) -> StructuredMessage {
    let mut msg = StructuredMessage::new(
        format!("📊 Daily Solar Flare Summary - {}", d.date.format("%B %d, %Y")),
        Severity::Neutral,
    )
    .description("Summary of today's solar flare activity and forecast");

    let forecast_text = match &d.forecast {
        Some(r) => format!(
            "**Today (1 day):** M-class: {}% | X-class: {}%\n\
             **Tomorrow (2 day):** M-class: {}% | X-class: {}%\n\
             **Day 3:** M-class: {}% | X-class: {}%",
            r.m_class_pct[0],
            r.x_class_pct[0],
            r.m_class_pct[1],
            r.x_class_pct[1],
            r.m_class_pct[2],
            r.x_class_pct[2]
        ),
        None => "No forecast data available".to_string(),
    };
    msg = msg.field("📈 Forecast Probabilities", forecast_text);

    if d.flares.is_empty() {
        msg = msg.field("⚡ Today's Flare Events", "No significant flares detected today");
    } else {
        let top = d.flares.iter().filter_map(|f| f.class()).map(|c| c.letter).max();
        let emoji = match top {
            Some(ClassLetter::X) => "🚨",
            Some(ClassLetter::M) => "⚠️",
            _ => "⚡",
        };
        let lines: Vec<String> = d
            .flares
            .iter()
            .map(|f| {
                format!(
                    "**Class:** {} | **Peak Time:** {}",
                    f.class_or_unknown(),
                    fmt_time(f.peak_time.or(f.observed_at), tz)
                )
            })
            .collect();
        msg = msg.field(format!("{emoji} Today's Flare Events"), lines.join("\n"));
    }

    if d.alerts.is_empty() {
        msg = msg.field("📢 Today's Alerts", "No alerts issued today");
    } else {
        let mut text = String::new();
        for a in d.alerts.iter().take(d.alert_cap) {
            text.push_str(&format!("• **{}** - {}\n", a.kind, fmt_time(a.issued_at, tz)));
        }
        if d.alerts.len() > d.alert_cap {
            text.push_str(&format!("\n*...and {} more*", d.alerts.len() - d.alert_cap));
        }
        msg = msg.field("📢 Today's Alerts", text.trim_end().to_string());
    }

    msg.footer(footer(now, tz, "SWPC • Daily Summary"))
}
