use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::events::OrderSummary;

const MAX_SUMMARY_LINES: usize = 4;
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Fire-and-forget chat-webhook notifier for order events.
///
/// Every failure is swallowed and logged: a dead chat webhook must never
/// affect order processing or back up the event loop.
pub struct Notifier {
    client: Client,
    webhook_url: String,
}

impl Notifier {
    /// Builds a notifier when a webhook URL is configured, `None` otherwise.
    pub fn from_config(webhook_url: Option<&str>) -> Option<Arc<Self>> {
        let url = webhook_url?.trim();
        if url.is_empty() {
            return None;
        }
        let client = match Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("notifier disabled, client construction failed: {}", e);
                return None;
            }
        };
        Some(Arc::new(Self {
            client,
            webhook_url: url.to_string(),
        }))
    }

    pub async fn order_created(&self, summary: &OrderSummary) {
        let message = format!(
            "📦 New order {} from {} for ${}\n{}",
            summary.order_id,
            summary.customer,
            summary.total,
            items_summary(&summary.item_lines),
        );
        self.post(&message).await;
    }

    pub async fn order_paid(&self, summary: &OrderSummary) {
        let message = format!(
            "✅ Order {} paid (${}) by {}",
            summary.order_id, summary.total, summary.customer,
        );
        self.post(&message).await;
    }

    async fn post(&self, content: &str) {
        let result = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": content }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("notification delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "notification rejected");
            }
            Err(e) => {
                warn!("notification failed: {}", e);
            }
        }
    }
}

/// First few item lines, with a trailing "+N more" when the order is long.
fn items_summary(lines: &[String]) -> String {
    if lines.len() <= MAX_SUMMARY_LINES {
        return lines.join("\n");
    }
    let mut shown: Vec<&str> = lines[..MAX_SUMMARY_LINES].iter().map(String::as_str).collect();
    let more = format!("+{} more", lines.len() - MAX_SUMMARY_LINES);
    shown.push(&more);
    shown.join("\n")
}
