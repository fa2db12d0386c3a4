use super::traits::{AlertPayload, AlertSink};
use super::ui::UiAlertSink;
use super::webhook::WebhookAlertSink;
use crate::config::AlertsConfig;
use crate::error::AlertError;
use crate::recovery::RecoveryPolicy;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Fans one alert out to every channel the organization's policy enables.
/// Per-sink failures are logged and swallowed; the caller learns which
/// channels actually delivered.
pub struct AlertRouter {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertRouter {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Standard wiring: UI notifications always, chat relays when configured.
    pub fn from_config(config: &AlertsConfig, pool: &SqlitePool) -> anyhow::Result<Self> {
        let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(UiAlertSink::new(pool.clone()))];
        if let Some(url) = &config.telegram_webhook_url {
            sinks.push(Arc::new(WebhookAlertSink::new(
                "telegram",
                url.as_str(),
                Duration::from_secs(10),
            )?));
        }
        if let Some(url) = &config.whatsapp_webhook_url {
            sinks.push(Arc::new(WebhookAlertSink::new(
                "whatsapp",
                url.as_str(),
                Duration::from_secs(10),
            )?));
        }
        Ok(Self { sinks })
    }

    /// Deliver to every enabled channel. `Err(NoChannels)` means no configured
    /// sink matched the policy's enabled flags; otherwise the returned list
    /// holds the channels that delivered (possibly empty if all attempts
    /// failed).
    pub async fn dispatch(
        &self,
        policy: &RecoveryPolicy,
        alert: &AlertPayload,
    ) -> Result<Vec<String>, AlertError> {
        let enabled: Vec<&Arc<dyn AlertSink>> = self
            .sinks
            .iter()
            .filter(|sink| channel_enabled(policy, sink.channel()))
            .collect();
        if enabled.is_empty() {
            return Err(AlertError::NoChannels);
        }

        let mut delivered = Vec::new();
        for sink in enabled {
            match sink.send(alert).await {
                Ok(()) => delivered.push(sink.channel().to_string()),
                Err(e) => {
                    tracing::warn!(
                        "alert delivery via {} failed for agent {}: {e}",
                        sink.channel(),
                        alert.agent_id
                    );
                }
            }
        }
        Ok(delivered)
    }
}

fn channel_enabled(policy: &RecoveryPolicy, channel: &str) -> bool {
    match channel {
        "telegram" => policy.alert_telegram,
        "whatsapp" => policy.alert_whatsapp,
        "ui" => policy.alert_ui,
        _ => false,
    }
}
