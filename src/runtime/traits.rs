use super::routing::WorkerCandidate;
use crate::error::RuntimeError;
use async_trait::async_trait;

/// Definitive answer from the runtime backend about one session.
#[derive(Debug, Clone)]
pub struct SessionProbe {
    pub reachable: bool,
    pub detail: Option<String>,
}

impl SessionProbe {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            detail: None,
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            reachable: false,
            detail: Some(detail.into()),
        }
    }
}

/// The runtime-session backend as Warden consumes it.
///
/// `Ok(probe)` is the backend's answer about a session; `Err` means the
/// backend itself could not be reached (transport failure, timeout), which
/// callers surface as a board-wide runtime error rather than a fact about the
/// session.
#[async_trait]
pub trait RuntimeSessions: Send + Sync {
    fn name(&self) -> &str;

    async fn check_session(&self, session_id: &str) -> Result<SessionProbe, RuntimeError>;

    async fn restart_agent(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
    ) -> Result<(), RuntimeError>;

    /// Workers advertised for restart placement. Empty when the backend does
    /// not support placement hints.
    async fn list_workers(&self) -> Vec<WorkerCandidate> {
        Vec::new()
    }
}
