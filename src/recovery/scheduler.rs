use super::engine;
use super::repository::{
    AttemptRecord, attempt_times_for_agent, commit_board_changes, find_open_incident,
    last_alert_at, note_incident_error, record_alert, resolve_policy,
};
use super::types::{
    IncidentStatus, RecoveryAction, RecoveryDecision, RecoveryIncident, RecoveryPolicy,
    SuppressReason, SweepOutcome, SweepResult, SweepScope,
};
use crate::alerts::{AlertPayload, AlertRouter};
use crate::config::RecoveryDefaults;
use crate::continuity::{Continuity, ContinuityProbe, ContinuityReading};
use crate::db::MigrationGate;
use crate::runtime::RuntimeSessions;
use crate::tenancy::{AgentRecord, AgentStatus, Board, repository as tenancy_repo};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One board's contribution to the sweep totals.
#[derive(Debug, Default)]
struct BoardSweep {
    incident_count: u64,
    alerts_sent: u64,
    alerts_suppressed_dedupe: u64,
    alerts_skipped_status: u64,
    incidents: Vec<RecoveryIncident>,
}

/// Alert queued during board processing, dispatched after the board's row
/// mutations have committed. Carries the incident status as it stood when
/// the agent was flagged, so terminal incidents never re-alert.
struct PendingAlert {
    incident_id: String,
    status_at_detection: IncidentStatus,
    payload: AlertPayload,
}

/// Orchestrates one full detect-decide-act cycle across boards. Holds no
/// state between runs; the invoking harness guarantees sweeps never overlap.
pub struct RecoveryScheduler {
    pool: SqlitePool,
    probe: ContinuityProbe,
    runtime: Arc<dyn RuntimeSessions>,
    alerts: AlertRouter,
    gate: Arc<MigrationGate>,
    defaults: RecoveryDefaults,
}

impl RecoveryScheduler {
    pub fn new(
        pool: SqlitePool,
        probe: ContinuityProbe,
        runtime: Arc<dyn RuntimeSessions>,
        alerts: AlertRouter,
        gate: Arc<MigrationGate>,
        defaults: RecoveryDefaults,
    ) -> Self {
        Self {
            pool,
            probe,
            runtime,
            alerts,
            gate,
            defaults,
        }
    }

    /// One sweep over the boards in scope. Refuses (without erroring) when
    /// the schema is behind the running code. Per-board failures are logged
    /// and that board's counters dropped; only a scope-enumeration failure
    /// propagates. Cancellation is honored between boards, never mid-board.
    pub async fn run_once(
        &self,
        scope: &SweepScope,
        cancel: &CancellationToken,
    ) -> Result<SweepOutcome> {
        if !self.gate.is_ready().await {
            tracing::warn!("sweep refused: database schema is not ready");
            return Ok(SweepOutcome::NotReady);
        }

        let boards = match scope {
            SweepScope::AllBoards => tenancy_repo::list_boards(&self.pool).await?,
            SweepScope::Board(board_id) => {
                let board = tenancy_repo::get_board(&self.pool, board_id)
                    .await?
                    .with_context(|| format!("board '{board_id}' not found"))?;
                vec![board]
            }
        };

        let mut result = SweepResult::default();
        for board in boards {
            if cancel.is_cancelled() {
                tracing::info!("sweep cancelled before board {}", board.id);
                break;
            }
            match self.sweep_board(&board).await {
                Ok(sweep) => {
                    result.board_count += 1;
                    result.incident_count += sweep.incident_count;
                    result.alerts_sent += sweep.alerts_sent;
                    result.alerts_suppressed_dedupe += sweep.alerts_suppressed_dedupe;
                    result.alerts_skipped_status += sweep.alerts_skipped_status;
                    result.incidents.extend(sweep.incidents);
                }
                Err(e) => {
                    tracing::error!("sweep failed for board {}: {e:#}", board.id);
                }
            }
        }

        tracing::info!(
            "sweep complete: {} boards, {} incidents, {} alerts sent ({} deduped, {} skipped)",
            result.board_count,
            result.incident_count,
            result.alerts_sent,
            result.alerts_suppressed_dedupe,
            result.alerts_skipped_status
        );
        Ok(SweepOutcome::Completed(result))
    }

    /// Classify, decide, restart, persist, then alert — in that order. Row
    /// mutations commit atomically before any alert leaves the process, so a
    /// failed board never alerts on state that was rolled back.
    async fn sweep_board(&self, board: &Board) -> Result<BoardSweep> {
        let now = Utc::now();
        let policy = resolve_policy(&self.pool, &board.organization_id, &self.defaults).await?;
        let agents: Vec<AgentRecord> = tenancy_repo::agents_for_board(&self.pool, &board.id)
            .await?
            .into_iter()
            .filter(|agent| agent.status == AgentStatus::Active)
            .collect();

        let (readings, runtime_error) = self
            .probe
            .survey(&agents, policy.stale_after_seconds, now)
            .await;
        if let Some(error) = &runtime_error {
            tracing::warn!("board {}: runtime backend degraded: {error}", board.id);
        }

        let mut sweep = BoardSweep::default();
        let mut touched: Vec<RecoveryIncident> = Vec::new();
        let mut new_attempts: Vec<AttemptRecord> = Vec::new();
        let mut pending: Vec<PendingAlert> = Vec::new();

        for (agent, reading) in agents.iter().zip(&readings) {
            match reading.continuity {
                Continuity::Alive => {
                    if let Some(mut incident) = find_open_incident(&self.pool, &agent.id).await? {
                        incident.status = IncidentStatus::Recovered;
                        incident.recovered_at = Some(now);
                        incident.updated_at = now;
                        tracing::info!(
                            "agent {} recovered (incident {}, {} attempts)",
                            agent.id,
                            incident.id,
                            incident.attempts
                        );
                        touched.push(incident);
                    }
                }
                Continuity::Stale | Continuity::Unreachable => {
                    sweep.incident_count += 1;
                    let (incident, status_before, decision) = self
                        .handle_flagged(board, agent, reading, &policy, now, &mut new_attempts)
                        .await?;
                    pending.push(PendingAlert {
                        incident_id: incident.id.clone(),
                        status_at_detection: status_before,
                        payload: alert_payload(board, agent, reading, &incident, decision),
                    });
                    touched.push(incident);
                }
            }
        }

        commit_board_changes(&self.pool, &touched, &new_attempts).await?;

        self.dispatch_alerts(&policy, pending, now, &mut sweep).await;
        sweep.incidents = touched;
        Ok(sweep)
    }

    /// Find or open the incident for a flagged agent and run the policy
    /// decision against the agent's persisted attempt history. Returns the
    /// incident's next state without persisting it.
    async fn handle_flagged(
        &self,
        board: &Board,
        agent: &AgentRecord,
        reading: &ContinuityReading,
        policy: &RecoveryPolicy,
        now: DateTime<Utc>,
        attempts_out: &mut Vec<AttemptRecord>,
    ) -> Result<(RecoveryIncident, IncidentStatus, RecoveryDecision)> {
        let mut incident = match find_open_incident(&self.pool, &agent.id).await? {
            Some(mut open) => {
                // Classification can move while an incident is open (stale
                // agent whose session then dies); keep the row truthful.
                if open.reason != reading.reason {
                    open.reason = reading.reason.to_string();
                }
                open
            }
            None => {
                tracing::info!(
                    "agent {} flagged {} ({})",
                    agent.id,
                    reading.continuity,
                    reading.reason
                );
                RecoveryIncident::detect(
                    &board.organization_id,
                    &board.id,
                    &agent.id,
                    reading.reason,
                    now,
                )
            }
        };
        let status_before = incident.status;

        // Cooldowns longer than the budget window still need the history.
        let lookback = engine::ATTEMPT_WINDOW_SECONDS.max(policy.cooldown_seconds);
        let history =
            attempt_times_for_agent(&self.pool, &agent.id, now - Duration::seconds(lookback))
                .await?;
        let decision = engine::decide(&history, policy, now);
        incident.action = Some(decision.action);

        match decision.action {
            RecoveryAction::Restart => {
                incident.attempts += 1;
                incident.status = IncidentStatus::Recovering;
                attempts_out.push(AttemptRecord {
                    agent_id: agent.id.clone(),
                    incident_id: incident.id.clone(),
                    attempted_at: now,
                });
                match self
                    .runtime
                    .restart_agent(&agent.id, agent.runtime_session_id.as_deref())
                    .await
                {
                    Ok(()) => {
                        incident.last_error = None;
                        tracing::info!(
                            "restart triggered for agent {} (attempt {})",
                            agent.id,
                            incident.attempts
                        );
                    }
                    Err(e) => {
                        let message = e.to_string();
                        tracing::warn!("restart failed for agent {}: {message}", agent.id);
                        incident.last_error = Some(message);
                        let used = engine::attempts_in_window(&history, now) + 1;
                        if used >= u64::from(policy.max_restarts_per_hour) {
                            incident.status = IncidentStatus::Failed;
                            tracing::error!(
                                "giving up on agent {}: restart budget exhausted with last attempt failing",
                                agent.id
                            );
                        }
                    }
                }
            }
            RecoveryAction::AlertOnly | RecoveryAction::None => {
                if matches!(
                    decision.suppress_reason,
                    Some(SuppressReason::PolicyDisabled | SuppressReason::RestartBudgetExhausted)
                ) {
                    incident.status = IncidentStatus::Suppressed;
                }
                // Cooldown leaves the incident open untouched for next sweep.
            }
        }
        incident.updated_at = now;

        Ok((incident, status_before, decision))
    }

    /// Post-commit alert phase. Failures here are logged, never raised — the
    /// board's row state is already durable.
    async fn dispatch_alerts(
        &self,
        policy: &RecoveryPolicy,
        pending: Vec<PendingAlert>,
        now: DateTime<Utc>,
        sweep: &mut BoardSweep,
    ) {
        for alert in pending {
            if alert.status_at_detection.is_terminal() || !policy.any_alert_channel_enabled() {
                sweep.alerts_skipped_status += 1;
                continue;
            }

            let last = match last_alert_at(&self.pool, &alert.payload.agent_id, &alert.payload.reason).await
            {
                Ok(last) => last,
                Err(e) => {
                    tracing::error!(
                        "alert history lookup failed for agent {}; alerting without dedupe: {e:#}",
                        alert.payload.agent_id
                    );
                    None
                }
            };
            if !engine::should_alert(last, policy.alert_dedupe_seconds, now) {
                tracing::debug!(
                    "alert for agent {} ({}) suppressed by dedupe window",
                    alert.payload.agent_id,
                    alert.payload.reason
                );
                sweep.alerts_suppressed_dedupe += 1;
                continue;
            }

            match self.alerts.dispatch(policy, &alert.payload).await {
                Ok(delivered) if delivered.is_empty() => {
                    tracing::warn!(
                        "alert delivery failed on every channel for agent {}",
                        alert.payload.agent_id
                    );
                    if let Err(e) = note_incident_error(
                        &self.pool,
                        &alert.incident_id,
                        "alert delivery failed on all channels",
                    )
                    .await
                    {
                        tracing::error!(
                            "failed to note delivery error on incident {}: {e:#}",
                            alert.incident_id
                        );
                    }
                }
                Ok(delivered) => {
                    if let Err(e) = record_alert(
                        &self.pool,
                        &alert.payload.organization_id,
                        &alert.payload.agent_id,
                        &alert.payload.reason,
                        &delivered,
                        &alert.payload.message,
                        now,
                    )
                    .await
                    {
                        tracing::error!(
                            "failed to record alert for agent {}: {e:#}",
                            alert.payload.agent_id
                        );
                    }
                    sweep.alerts_sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "alert dispatch skipped for agent {}: {e}",
                        alert.payload.agent_id
                    );
                    sweep.alerts_skipped_status += 1;
                }
            }
        }
    }
}

fn alert_payload(
    board: &Board,
    agent: &AgentRecord,
    reading: &ContinuityReading,
    incident: &RecoveryIncident,
    decision: RecoveryDecision,
) -> AlertPayload {
    let detail = match (decision.action, decision.suppress_reason) {
        (RecoveryAction::Restart, _) => format!("restart attempt {}", incident.attempts),
        (_, Some(reason)) => format!("no restart ({reason})"),
        (_, None) => "no action".to_string(),
    };
    AlertPayload {
        organization_id: board.organization_id.clone(),
        board_id: board.id.clone(),
        board_name: board.name.clone(),
        agent_id: agent.id.clone(),
        agent_name: agent.name.clone(),
        reason: reading.reason.to_string(),
        message: format!(
            "Agent '{}' on board '{}' is {} ({}); {detail}",
            agent.name, board.name, reading.continuity, reading.reason
        ),
    }
}
