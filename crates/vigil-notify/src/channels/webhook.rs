use crate::error::{NotifyError, Result};
use crate::payload::{trigger_payload, truncate_string, MAX_BODY_LENGTH};
use crate::{Delivery, NotificationChannel};
use async_trait::async_trait;
use std::time::Duration;
use vigil_common::types::{AlertTrigger, ChannelKind, NotificationConfig};

/// POSTs the trigger as JSON to the URL configured on the alert.
///
/// Custom headers from the alert are applied after the JSON body, so they
/// can override `Content-Type`. Delivery is attempted once.
pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, trigger: &AlertTrigger, config: &NotificationConfig) -> Result<Delivery> {
        let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            tracing::warn!(alert_id = %trigger.alert_id, "Webhook enabled without a URL, skipping");
            return Ok(Delivery::Skipped("no webhook url configured".into()));
        };

        let mut request = self.client.post(url).json(&trigger_payload(trigger));
        for (name, value) in &config.webhook_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            tracing::debug!(alert_id = %trigger.alert_id, status = %status, "Webhook delivered");
            return Ok(Delivery::Delivered);
        }

        let body = match resp.text().await {
            Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Err(NotifyError::ApiError {
            service: "webhook".to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }
}
