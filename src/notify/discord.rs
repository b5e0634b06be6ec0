use super::{Notifier, StructuredMessage};
use crate::registry::Destination;
use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

const API_BASE: &str = "https://discord.com/api/v10";
const EMBED_DESCRIPTION_MAX: usize = 4096;
const EMBED_FIELD_MAX: usize = 1024;

/// Posts embeds to channels/threads through the Discord bot REST API.
#[derive(Clone)]
pub struct DiscordNotifier {
    token: String,
    base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Point at a different API root (tests, proxies).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, dest: &Destination, msg: &StructuredMessage) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.base, dest.as_str());
        let payload = DiscordMessagePayload::from_message(msg);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .header("Authorization", format!("Bot {}", self.token))
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    // 4xx other than rate limiting means the channel is gone or forbidden.
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("Discord HTTP {status}: {body}"));
                }
                // Only a refused connection is known not to have posted; a timeout
                // or reset after the request went out may already have been accepted.
                Err(e) => {
                    if e.is_connect() && attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("Discord request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

#[derive(Serialize)]
struct DiscordEmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordEmbedImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbedFooter {
    text: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    fields: Vec<DiscordEmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordEmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<DiscordEmbedFooter>,
}

#[derive(Serialize)]
struct DiscordMessagePayload {
    embeds: Vec<DiscordEmbed>,
}

impl DiscordMessagePayload {
    fn from_message(msg: &StructuredMessage) -> Self {
        Self {
            embeds: vec![DiscordEmbed {
                title: clip(&msg.title, 256),
                color: msg.severity.rgb(),
                description: msg
                    .description
                    .as_deref()
                    .map(|d| clip(d, EMBED_DESCRIPTION_MAX)),
                fields: msg
                    .fields
                    .iter()
                    .take(25)
                    .map(|f| DiscordEmbedField {
                        name: clip(&f.name, 256),
                        value: clip(&f.value, EMBED_FIELD_MAX),
                        inline: f.inline,
                    })
                    .collect(),
                image: msg
                    .image_url
                    .as_ref()
                    .map(|u| DiscordEmbedImage { url: u.clone() }),
                footer: (!msg.footer.is_empty()).then(|| DiscordEmbedFooter {
                    text: clip(&msg.footer, 2048),
                }),
            }],
        }
    }
}
