use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{Notifier, StructuredMessage};
use crate::registry::Destination;

const API_BASE: &str = "https://slack.com/api";

/// Posts attachments via `chat.postMessage` with a bot token.
pub struct SlackNotifier {
    token: String,
    base: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack mrkdwn uses single `*` for bold.
fn mrkdwn(s: &str) -> String {
    s.replace("**", "*")
}

pub(crate) fn render(dest: &Destination, msg: &StructuredMessage) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = msg
        .fields
        .iter()
        .map(|f| {
            serde_json::json!({
                "title": f.name,
                "value": mrkdwn(&f.value),
                "short": f.inline,
            })
        })
        .collect();

    let mut attachment = serde_json::json!({
        "color": msg.severity.hex(),
        "title": msg.title,
        "fields": fields,
        "footer": msg.footer,
        "mrkdwn_in": ["text", "fields"],
    });
    if let Some(d) = &msg.description {
        attachment["text"] = serde_json::Value::String(mrkdwn(d));
    }
    if let Some(u) = &msg.image_url {
        attachment["image_url"] = serde_json::Value::String(u.clone());
    }

    serde_json::json!({
        "channel": dest.as_str(),
        "text": msg.title,
        "attachments": [attachment],
    })
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn deliver(&self, dest: &Destination, msg: &StructuredMessage) -> Result<()> {
        let body = render(dest, msg);
        let rsp: SlackResponse = self
            .client
            .post(format!("{}/chat.postMessage", self.base))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?
            .json()
            .await
            .context("slack response body")?;

        // Slack reports most failures (channel_not_found, not_in_channel) with HTTP 200.
        if !rsp.ok {
            return Err(anyhow!(
                "slack rejected message: {}",
                rsp.error.unwrap_or_else(|| "unknown_error".into())
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
