// src/notify/mod.rs
//! Platform-neutral outbound messages and the delivery seam.
//!
//! Core code builds a `StructuredMessage` once and hands it to a `Notifier`;
//! each chat adapter renders it natively (Discord embed, Slack attachment,
//! plain log line).

pub mod discord;
pub mod fanout;
pub mod format;
pub mod log;
pub mod slack;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classify::Severity;
use crate::config::{BridgeConfig, Platform};
use crate::registry::Destination;

pub use fanout::{fanout, DeliveryHealth, FanoutReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredMessage {
    pub title: String,
    pub severity: Severity,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub image_url: Option<String>,
    pub footer: String,
}

impl StructuredMessage {
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            severity,
            description: None,
            fields: Vec::new(),
            image_url: None,
            footer: String::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    pub fn inline_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline: true,
        });
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = text.into();
        self
    }

    /// Value of the first field called `name`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// One delivery attempt to one destination.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, dest: &Destination, msg: &StructuredMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Build the notifier for the configured platform. Fails when the credential is missing.
pub fn notifier_from_config(cfg: &BridgeConfig) -> Result<Arc<dyn Notifier>> {
    let token = cfg.credential()?;
    Ok(match (cfg.platform, token) {
        (Platform::Discord, Some(t)) => Arc::new(
            discord::DiscordNotifier::new(t).with_timeout(cfg.delivery_timeout_secs),
        ),
        (Platform::Slack, Some(t)) => {
            Arc::new(slack::SlackNotifier::new(t).with_timeout(cfg.delivery_timeout_secs))
        }
        _ => Arc::new(log::LogNotifier),
    })
}
