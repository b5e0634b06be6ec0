use anyhow::Result;

use super::{Notifier, StructuredMessage};
use crate::registry::Destination;

/// Writes messages to the log instead of a chat platform.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, dest: &Destination, msg: &StructuredMessage) -> Result<()> {
        let fields = msg
            .fields
            .iter()
            .map(|f| format!("{}={}", f.name, f.value.replace('\n', " / ")))
            .collect::<Vec<_>>()
            .join("; ");
        tracing::info!(
            target: "notify",
            destination = %dest,
            severity = ?msg.severity,
            title = %msg.title,
            fields = %fields,
            "message"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
