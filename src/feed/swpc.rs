use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::normalize;
use super::types::{AlertRecord, FeedSource, FlareRecord, ForecastEntry};
use super::{ensure_metrics_described, record_failure, FeedError};
use crate::config::Endpoints;

const USER_AGENT: &str = concat!("solar-flare-bridge/", env!("CARGO_PKG_VERSION"));

/// Client for the three public SWPC JSON products.
pub struct SwpcClient {
    mode: Mode,
}

enum Mode {
    /// Canned bodies, one per product; used by tests and the demo binary.
    Fixture {
        flare: String,
        forecast: String,
        alerts: String,
    },
    Http {
        endpoints: Endpoints,
        client: reqwest::Client,
    },
}

#[derive(Clone, Copy)]
enum Product {
    Flare,
    Forecast,
    Alerts,
}

impl Product {
    fn label(self) -> &'static str {
        match self {
            Product::Flare => "flare_latest",
            Product::Forecast => "flare_forecast",
            Product::Alerts => "alerts",
        }
    }
}

impl SwpcClient {
    /// HTTP client with a total per-request timeout.
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("building SWPC http client")?;
        Ok(Self {
            mode: Mode::Http { endpoints, client },
        })
    }

    pub fn from_fixtures(
        flare: impl Into<String>,
        forecast: impl Into<String>,
        alerts: impl Into<String>,
    ) -> Self {
        Self {
            mode: Mode::Fixture {
                flare: flare.into(),
                forecast: forecast.into(),
                alerts: alerts.into(),
            },
        }
    }

    async fn fetch(&self, product: Product) -> Result<Value, FeedError> {
        ensure_metrics_described();
        let t0 = Instant::now();
        let body = match &self.mode {
            Mode::Fixture {
                flare,
                forecast,
                alerts,
            } => match product {
                Product::Flare => flare.clone(),
                Product::Forecast => forecast.clone(),
                Product::Alerts => alerts.clone(),
            },
            Mode::Http { endpoints, client } => {
                let url = match product {
                    Product::Flare => &endpoints.flare_latest,
                    Product::Forecast => &endpoints.forecast,
                    Product::Alerts => &endpoints.alerts,
                };
                counter!("feed_fetches_total", "feed" => product.label()).increment(1);
                let resp = client.get(url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FeedError::Status(status));
                }
                resp.text().await?
            }
        };
        let out = normalize::decode_payload(&body);
        histogram!("feed_fetch_ms", "feed" => product.label())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        out
    }
}

#[async_trait]
impl FeedSource for SwpcClient {
    async fn latest_flare(&self) -> Option<FlareRecord> {
        let product = Product::Flare;
        match self.fetch(product).await.and_then(normalize::latest_flare) {
            Ok(f) => Some(f),
            Err(e) => {
                record_failure(product.label(), &e);
                None
            }
        }
    }

    async fn forecast(&self) -> Vec<ForecastEntry> {
        let product = Product::Forecast;
        match self.fetch(product).await.and_then(normalize::forecast) {
            Ok(rows) => rows,
            Err(e) => {
                record_failure(product.label(), &e);
                Vec::new()
            }
        }
    }

    async fn alerts(&self, limit: usize) -> Vec<AlertRecord> {
        let product = Product::Alerts;
        match self
            .fetch(product)
            .await
            .and_then(|v| normalize::flare_alerts(v, limit))
        {
            Ok(rows) => rows,
            Err(e) => {
                record_failure(product.label(), &e);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "SWPC"
    }
}
