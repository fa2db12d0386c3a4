use super::routing::{self, WorkerCandidate};
use super::traits::{RuntimeSessions, SessionProbe};
use crate::error::RuntimeError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// HTTP client for the runtime-session backend.
///
/// Expected surface: `GET /sessions/{id}` (200 with a status body, 404 when
/// the session is gone), `POST /agents/{id}/restart`, `GET /workers`.
pub struct HttpRuntimeClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SessionStatusBody {
    #[serde(default)]
    reachable: bool,
    #[serde(default)]
    detail: Option<String>,
}

impl HttpRuntimeClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build runtime HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl RuntimeSessions for HttpRuntimeClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn check_session(&self, session_id: &str) -> Result<SessionProbe, RuntimeError> {
        let url = format!("{}/sessions/{session_id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RuntimeError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(SessionProbe::unreachable("session not found"));
        }
        if !resp.status().is_success() {
            return Err(RuntimeError::Probe {
                session_id: session_id.to_string(),
                message: format!("backend returned {}", resp.status()),
            });
        }

        let body: SessionStatusBody = resp.json().await.map_err(|e| RuntimeError::Probe {
            session_id: session_id.to_string(),
            message: format!("invalid status body: {e}"),
        })?;
        Ok(SessionProbe {
            reachable: body.reachable,
            detail: body.detail,
        })
    }

    async fn restart_agent(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let workers = self.list_workers().await;
        let placement = routing::pick_worker(&workers).map(|w| w.id.clone());

        let url = format!("{}/agents/{agent_id}/restart", self.base_url);
        let body = serde_json::json!({
            "session_id": session_id,
            "worker_id": placement,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_body = resp.text().await.unwrap_or_default();
            tracing::error!("runtime restart failed for {agent_id}: {status} — {error_body}");
            return Err(RuntimeError::Restart {
                agent_id: agent_id.to_string(),
                message: format!("backend returned {status}"),
            });
        }
        Ok(())
    }

    async fn list_workers(&self) -> Vec<WorkerCandidate> {
        let url = format!("{}/workers", self.base_url);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!("worker listing returned {}", resp.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("worker listing unavailable: {e}");
                return Vec::new();
            }
        };
        match resp.json::<Vec<WorkerCandidate>>().await {
            Ok(workers) => workers,
            Err(e) => {
                tracing::debug!("worker listing body invalid: {e}");
                Vec::new()
            }
        }
    }
}
