use super::traits::{AlertPayload, AlertSink};
use crate::error::AlertError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Chat-channel delivery via a relay endpoint. The messaging service behind
/// the URL holds the platform credentials and does the actual Telegram or
/// WhatsApp call; Warden only posts the alert payload.
pub struct WebhookAlertSink {
    channel: &'static str,
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(channel: &'static str, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build alert relay client")?;
        Ok(Self {
            channel,
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    fn channel(&self) -> &'static str {
        self.channel
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), AlertError> {
        let resp = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| AlertError::Delivery {
                channel: self.channel.to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_body = resp.text().await.unwrap_or_default();
            tracing::error!("{} alert relay failed: {status} - {error_body}", self.channel);
            return Err(AlertError::Delivery {
                channel: self.channel.to_string(),
                message: format!("relay returned {status}"),
            });
        }
        Ok(())
    }
}
