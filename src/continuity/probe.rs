use super::types::{
    Continuity, ContinuityCounts, ContinuityReading, ContinuitySnapshot, REASON_HEARTBEAT_FRESH,
    REASON_NEVER_SEEN, REASON_SESSION_UNREACHABLE, REASON_STALE_HEARTBEAT,
};
use crate::config::RecoveryDefaults;
use crate::error::RuntimeError;
use crate::recovery::repository::resolve_policy;
use crate::runtime::RuntimeSessions;
use crate::tenancy::{repository as tenancy_repo, AgentRecord, AgentStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// What the runtime backend said about an agent's session. `Absent` means the
/// agent has no session registered, so reachability is not a signal either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionSignal {
    Absent,
    Reachable,
    Unreachable,
}

/// Classifies agent liveness from stored heartbeat recency plus a live
/// runtime-session check. Pure read side: never mutates agent rows.
pub struct ContinuityProbe {
    runtime: Arc<dyn RuntimeSessions>,
}

impl ContinuityProbe {
    pub fn new(runtime: Arc<dyn RuntimeSessions>) -> Self {
        Self { runtime }
    }

    /// Classify one agent. Backend failures fold into an unreachable reading
    /// with the error text in `probe_detail`; this never errors.
    pub async fn classify(
        &self,
        agent: &AgentRecord,
        stale_after_seconds: i64,
        now: DateTime<Utc>,
    ) -> ContinuityReading {
        let (signal, detail, _backend_error) = self.probe_session(agent).await;
        build_reading(agent, stale_after_seconds, now, signal, detail)
    }

    /// Classify every agent in `agents`. The first transport-level backend
    /// failure is captured as the board-wide error and stops further backend
    /// calls for this survey; the remaining sessions are treated as
    /// unreachable rather than probed against a dead backend.
    pub async fn survey(
        &self,
        agents: &[AgentRecord],
        stale_after_seconds: i64,
        now: DateTime<Utc>,
    ) -> (Vec<ContinuityReading>, Option<String>) {
        let mut runtime_error: Option<String> = None;
        let mut readings = Vec::with_capacity(agents.len());

        for agent in agents {
            let (signal, detail) = if runtime_error.is_some() && agent.runtime_session_id.is_some()
            {
                (SessionSignal::Unreachable, runtime_error.clone())
            } else {
                let (signal, detail, backend_error) = self.probe_session(agent).await;
                if let Some(message) = backend_error {
                    tracing::warn!("runtime backend unreachable during survey: {message}");
                    runtime_error.get_or_insert(message);
                }
                (signal, detail)
            };
            readings.push(build_reading(agent, stale_after_seconds, now, signal, detail));
        }

        (readings, runtime_error)
    }

    /// Board-wide continuity view: all active agents classified under the
    /// owning organization's policy. Errors only on store failures; a dead
    /// runtime backend degrades `runtime_error` instead.
    pub async fn snapshot_for_board(
        &self,
        pool: &SqlitePool,
        board_id: &str,
        defaults: &RecoveryDefaults,
    ) -> Result<ContinuitySnapshot> {
        let board = tenancy_repo::get_board(pool, board_id)
            .await?
            .with_context(|| format!("board '{board_id}' not found"))?;
        let policy = resolve_policy(pool, &board.organization_id, defaults).await?;
        let agents: Vec<AgentRecord> = tenancy_repo::agents_for_board(pool, board_id)
            .await?
            .into_iter()
            .filter(|agent| agent.status == AgentStatus::Active)
            .collect();

        let now = Utc::now();
        let (readings, runtime_error) = self
            .survey(&agents, policy.stale_after_seconds, now)
            .await;

        let mut counts = ContinuityCounts::default();
        for reading in &readings {
            counts.tally(reading.continuity);
        }

        Ok(ContinuitySnapshot {
            board_id: board.id,
            generated_at: now,
            runtime_error,
            counts,
            agents: readings,
        })
    }

    /// Returns `(signal, detail, backend_error)`. `backend_error` is set only
    /// for transport-level failures where the backend itself was unreachable.
    async fn probe_session(
        &self,
        agent: &AgentRecord,
    ) -> (SessionSignal, Option<String>, Option<String>) {
        let Some(session_id) = agent.runtime_session_id.as_deref() else {
            return (SessionSignal::Absent, None, None);
        };
        match self.runtime.check_session(session_id).await {
            Ok(probe) if probe.reachable => (SessionSignal::Reachable, probe.detail, None),
            Ok(probe) => (SessionSignal::Unreachable, probe.detail, None),
            Err(RuntimeError::Backend(message)) => (
                SessionSignal::Unreachable,
                Some(message.clone()),
                Some(message),
            ),
            Err(e) => (SessionSignal::Unreachable, Some(e.to_string()), None),
        }
    }
}

fn build_reading(
    agent: &AgentRecord,
    stale_after_seconds: i64,
    now: DateTime<Utc>,
    signal: SessionSignal,
    detail: Option<String>,
) -> ContinuityReading {
    let heartbeat_age_seconds = agent
        .last_seen_at
        .map(|seen| (now - seen).num_seconds().max(0));
    let (continuity, reason) = classify_signals(
        agent.last_seen_at.is_some(),
        heartbeat_age_seconds,
        signal,
        stale_after_seconds,
    );

    ContinuityReading {
        agent_id: agent.id.clone(),
        agent_name: agent.name.clone(),
        continuity,
        reason,
        probe_detail: detail,
        runtime_session_id: agent.runtime_session_id.clone(),
        runtime_reachable: signal == SessionSignal::Reachable,
        last_seen_at: agent.last_seen_at,
        heartbeat_age_seconds,
    }
}

/// The decision table, evaluated in order. An unreachable session outranks
/// staleness; a reachable session keeps a never-seen agent out of the
/// `never_seen` bucket.
fn classify_signals(
    ever_seen: bool,
    heartbeat_age_seconds: Option<i64>,
    signal: SessionSignal,
    stale_after_seconds: i64,
) -> (Continuity, &'static str) {
    if !ever_seen && signal != SessionSignal::Reachable {
        return (Continuity::Unreachable, REASON_NEVER_SEEN);
    }
    if signal == SessionSignal::Unreachable {
        return (Continuity::Unreachable, REASON_SESSION_UNREACHABLE);
    }
    if heartbeat_age_seconds.is_some_and(|age| age > stale_after_seconds) {
        return (Continuity::Stale, REASON_STALE_HEARTBEAT);
    }
    (Continuity::Alive, REASON_HEARTBEAT_FRESH)
}
