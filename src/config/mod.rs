// src/config/mod.rs
//! Service configuration.
//!
//! Resolution order:
//! 1) `$FLARE_BRIDGE_CONFIG` (TOML or JSON, must exist when set)
//! 2) `config/bridge.toml`
//! 3) `config/bridge.json`
//! 4) built-in defaults
//!
//! Environment overrides are applied on top, then values are sanitized.
//! The chat credential always comes from the environment.

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "FLARE_BRIDGE_CONFIG";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const ENV_SLACK_TOKEN: &str = "SLACK_BOT_TOKEN";

const DEFAULT_POLL_SECS: u64 = 60;
const DEFAULT_DIGEST_CHECK_SECS: u64 = 300;
const DEFAULT_STATUS_REFRESH_SECS: u64 = 600;
const DEFAULT_DIGEST_HOUR: u32 = 17;
const DEFAULT_DIGEST_WINDOW_MIN: u32 = 5;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TZ: &str = "America/New_York";

/// Which chat platform the notifier talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Discord,
    Slack,
    /// Log-only delivery; no credential needed.
    Log,
}

impl std::str::FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Platform::Discord),
            "slack" => Ok(Platform::Slack),
            "log" | "stdout" => Ok(Platform::Log),
            other => Err(anyhow!("unsupported chat platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub flare_latest: String,
    pub forecast: String,
    pub alerts: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            flare_latest: "https://services.swpc.noaa.gov/json/goes/primary/xray-flares-latest.json"
                .to_string(),
            forecast: "https://services.swpc.noaa.gov/json/solar_probabilities.json".to_string(),
            alerts: "https://services.swpc.noaa.gov/products/alerts.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub poll_interval_secs: u64,
    pub digest_check_secs: u64,
    /// How often the status line is rebuilt from the feed.
    pub status_refresh_secs: u64,
    /// Local hour (0–23) at which the digest window opens.
    pub digest_hour: u32,
    /// Width of the window in minutes; the digest fires when `minute < width`.
    pub digest_window_minutes: u32,
    /// IANA zone used for "today" and for display.
    pub timezone: String,
    pub fetch_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
    /// Consecutive delivery failures before a destination is dropped; 0 keeps it forever.
    pub max_delivery_failures: u32,
    pub digest_alert_cap: usize,
    pub digest_alert_fetch: usize,
    pub history_capacity: usize,
    pub platform: Platform,
    pub endpoints: Endpoints,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_SECS,
            digest_check_secs: DEFAULT_DIGEST_CHECK_SECS,
            status_refresh_secs: DEFAULT_STATUS_REFRESH_SECS,
            digest_hour: DEFAULT_DIGEST_HOUR,
            digest_window_minutes: DEFAULT_DIGEST_WINDOW_MIN,
            timezone: DEFAULT_TZ.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            delivery_timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            max_delivery_failures: 1,
            digest_alert_cap: 5,
            digest_alert_fetch: 20,
            history_capacity: 200,
            platform: Platform::Discord,
            endpoints: Endpoints::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bridge config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: BridgeConfig = if ext == "json" {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        };
        Ok(cfg.sanitized())
    }

    /// File lookup + env overrides, see module docs.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::load_from(&pb)?
        } else if Path::new("config/bridge.toml").exists() {
            Self::load_from(Path::new("config/bridge.toml"))?
        } else if Path::new("config/bridge.json").exists() {
            Self::load_from(Path::new("config/bridge.json"))?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        fn num<T: std::str::FromStr>(key: &str) -> Option<T> {
            env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }
        if let Some(v) = num("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = v;
        }
        if let Some(v) = num("DIGEST_CHECK_SECS") {
            self.digest_check_secs = v;
        }
        if let Some(v) = num("STATUS_REFRESH_SECS") {
            self.status_refresh_secs = v;
        }
        if let Some(v) = num("DIGEST_HOUR") {
            self.digest_hour = v;
        }
        if let Some(v) = num("MAX_DELIVERY_FAILURES") {
            self.max_delivery_failures = v;
        }
        if let Ok(tz) = env::var("DIGEST_TIMEZONE") {
            self.timezone = tz;
        }
        if let Ok(p) = env::var("CHAT_PLATFORM") {
            self.platform = p.parse()?;
        }
        Ok(self.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = DEFAULT_POLL_SECS;
        }
        if self.digest_check_secs == 0 {
            self.digest_check_secs = DEFAULT_DIGEST_CHECK_SECS;
        }
        if self.status_refresh_secs == 0 {
            self.status_refresh_secs = DEFAULT_STATUS_REFRESH_SECS;
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = DEFAULT_FETCH_TIMEOUT_SECS;
        }
        if self.delivery_timeout_secs == 0 {
            self.delivery_timeout_secs = DEFAULT_DELIVERY_TIMEOUT_SECS;
        }
        self.digest_hour = self.digest_hour.min(23);
        self.digest_window_minutes = self.digest_window_minutes.clamp(1, 60);
        self.digest_alert_cap = self.digest_alert_cap.max(1);
        self.digest_alert_fetch = self.digest_alert_fetch.max(self.digest_alert_cap);
        self.history_capacity = self.history_capacity.clamp(1, 10_000);
        self
    }

    /// Fails on an unknown IANA zone name.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn digest_check_interval(&self) -> Duration {
        Duration::from_secs(self.digest_check_secs)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status_refresh_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Credential for the configured platform. Missing credential is fatal at startup.
    pub fn credential(&self) -> Result<Option<String>> {
        let key = match self.platform {
            Platform::Discord => ENV_DISCORD_TOKEN,
            Platform::Slack => ENV_SLACK_TOKEN,
            Platform::Log => return Ok(None),
        };
        match env::var(key) {
            Ok(v) if !v.trim().is_empty() => Ok(Some(v.trim().to_string())),
            _ => bail!("Missing {key} in environment"),
        }
    }
}
