use crate::error::AlertError;
use async_trait::async_trait;
use serde::Serialize;

/// Alert content handed to every sink. Sinks decide presentation; the
/// payload carries enough identity for downstream filtering.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub organization_id: String,
    pub board_id: String,
    pub board_name: String,
    pub agent_id: String,
    pub agent_name: String,
    pub reason: String,
    pub message: String,
}

/// One delivery channel. Implementations own their transport and must not
/// panic on delivery failure; the router logs and continues.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Channel key the policy flags refer to (`ui`, `telegram`, `whatsapp`).
    fn channel(&self) -> &'static str;

    async fn send(&self, alert: &AlertPayload) -> Result<(), AlertError>;
}
