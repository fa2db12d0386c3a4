use super::traits::{RuntimeSessions, SessionProbe};
use crate::error::RuntimeError;
use async_trait::async_trait;

/// Stand-in used when no runtime backend is configured: sessions are assumed
/// reachable (heartbeat staleness still classifies on its own) and restarts
/// fail soft so the incident records why nothing happened.
pub struct NoopRuntime;

#[async_trait]
impl RuntimeSessions for NoopRuntime {
    fn name(&self) -> &str {
        "noop"
    }

    async fn check_session(&self, _session_id: &str) -> Result<SessionProbe, RuntimeError> {
        Ok(SessionProbe {
            reachable: true,
            detail: Some("runtime probe disabled".into()),
        })
    }

    async fn restart_agent(
        &self,
        agent_id: &str,
        _session_id: Option<&str>,
    ) -> Result<(), RuntimeError> {
        Err(RuntimeError::Restart {
            agent_id: agent_id.to_string(),
            message: "runtime backend not configured".into(),
        })
    }
}
