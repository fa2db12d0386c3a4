use super::types::{IncidentStatus, RecoveryAction, RecoveryIncident, RecoveryPolicy};
use crate::config::RecoveryDefaults;
use crate::util::{parse_rfc3339, parse_rfc3339_opt};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One restart attempt, pending persistence alongside its incident.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub agent_id: String,
    pub incident_id: String,
    pub attempted_at: DateTime<Utc>,
}

/// Effective policy for an organization: the stored row if present, the
/// configured defaults otherwise. Never returns a partial policy.
pub async fn resolve_policy(
    pool: &SqlitePool,
    organization_id: &str,
    defaults: &RecoveryDefaults,
) -> Result<RecoveryPolicy> {
    let row = sqlx::query(
        "SELECT organization_id, enabled, stale_after_seconds, max_restarts_per_hour,
                cooldown_seconds, alert_dedupe_seconds, alert_telegram, alert_whatsapp, alert_ui
         FROM recovery_policies WHERE organization_id = ?",
    )
    .bind(organization_id)
    .fetch_optional(pool)
    .await
    .context("Failed to load recovery policy")?;

    match row {
        Some(row) => row_to_policy(&row),
        None => Ok(RecoveryPolicy::from_defaults(organization_id, defaults)),
    }
}

pub async fn upsert_policy(pool: &SqlitePool, policy: &RecoveryPolicy) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO recovery_policies (
            organization_id, enabled, stale_after_seconds, max_restarts_per_hour,
            cooldown_seconds, alert_dedupe_seconds, alert_telegram, alert_whatsapp,
            alert_ui, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(organization_id) DO UPDATE SET
            enabled = excluded.enabled,
            stale_after_seconds = excluded.stale_after_seconds,
            max_restarts_per_hour = excluded.max_restarts_per_hour,
            cooldown_seconds = excluded.cooldown_seconds,
            alert_dedupe_seconds = excluded.alert_dedupe_seconds,
            alert_telegram = excluded.alert_telegram,
            alert_whatsapp = excluded.alert_whatsapp,
            alert_ui = excluded.alert_ui,
            updated_at = excluded.updated_at",
    )
    .bind(&policy.organization_id)
    .bind(policy.enabled)
    .bind(policy.stale_after_seconds)
    .bind(policy.max_restarts_per_hour)
    .bind(policy.cooldown_seconds)
    .bind(policy.alert_dedupe_seconds)
    .bind(policy.alert_telegram)
    .bind(policy.alert_whatsapp)
    .bind(policy.alert_ui)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .context("Failed to upsert recovery policy")?;
    Ok(())
}

/// The open (non-terminal) incident for an agent, if one exists. At most one
/// is open per agent by construction; latest detection wins defensively.
pub async fn find_open_incident(
    pool: &SqlitePool,
    agent_id: &str,
) -> Result<Option<RecoveryIncident>> {
    let row = sqlx::query(
        "SELECT id, organization_id, board_id, agent_id, status, reason, action,
                attempts, last_error, detected_at, recovered_at, created_at, updated_at
         FROM recovery_incidents
         WHERE agent_id = ? AND status IN ('detected', 'recovering')
         ORDER BY detected_at DESC LIMIT 1",
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await
    .context("Failed to load open incident")?;
    row.as_ref().map(row_to_incident).transpose()
}

pub async fn get_incident(pool: &SqlitePool, id: &str) -> Result<Option<RecoveryIncident>> {
    let row = sqlx::query(
        "SELECT id, organization_id, board_id, agent_id, status, reason, action,
                attempts, last_error, detected_at, recovered_at, created_at, updated_at
         FROM recovery_incidents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to load incident")?;
    row.as_ref().map(row_to_incident).transpose()
}

pub async fn list_incidents_for_board(
    pool: &SqlitePool,
    board_id: &str,
    limit: u32,
) -> Result<Vec<RecoveryIncident>> {
    let rows = sqlx::query(
        "SELECT id, organization_id, board_id, agent_id, status, reason, action,
                attempts, last_error, detected_at, recovered_at, created_at, updated_at
         FROM recovery_incidents
         WHERE board_id = ? ORDER BY updated_at DESC LIMIT ?",
    )
    .bind(board_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list incidents for board")?;

    let mut incidents = Vec::with_capacity(rows.len());
    for row in rows {
        incidents.push(row_to_incident(&row)?);
    }
    Ok(incidents)
}

/// Restart attempts for an agent since `since`, oldest first. Spans incidents:
/// the hourly budget follows the agent, not the incident.
pub async fn attempt_times_for_agent(
    pool: &SqlitePool,
    agent_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    let rows = sqlx::query(
        "SELECT attempted_at FROM recovery_attempts
         WHERE agent_id = ? AND attempted_at >= ?
         ORDER BY attempted_at ASC",
    )
    .bind(agent_id)
    .bind(since.to_rfc3339())
    .fetch_all(pool)
    .await
    .context("Failed to load attempt history")?;

    let mut times = Vec::with_capacity(rows.len());
    for row in rows {
        times.push(parse_rfc3339(&row.try_get::<String, _>("attempted_at")?)?);
    }
    Ok(times)
}

pub async fn last_alert_at(
    pool: &SqlitePool,
    agent_id: &str,
    reason: &str,
) -> Result<Option<DateTime<Utc>>> {
    let row = sqlx::query(
        "SELECT sent_at FROM alert_log
         WHERE agent_id = ? AND reason = ?
         ORDER BY sent_at DESC LIMIT 1",
    )
    .bind(agent_id)
    .bind(reason)
    .fetch_optional(pool)
    .await
    .context("Failed to load alert history")?;

    match row {
        Some(row) => Ok(Some(parse_rfc3339(&row.try_get::<String, _>("sent_at")?)?)),
        None => Ok(None),
    }
}

pub async fn record_alert(
    pool: &SqlitePool,
    organization_id: &str,
    agent_id: &str,
    reason: &str,
    channels: &[String],
    message: &str,
    sent_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO alert_log (id, organization_id, agent_id, reason, channels, message, sent_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(organization_id)
    .bind(agent_id)
    .bind(reason)
    .bind(channels.join(","))
    .bind(message)
    .bind(sent_at.to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to record alert")?;
    Ok(())
}

/// Note a delivery failure on an incident without rewriting the rest of the
/// row. Runs outside the board transaction, after alert dispatch.
pub async fn note_incident_error(pool: &SqlitePool, incident_id: &str, error: &str) -> Result<()> {
    sqlx::query("UPDATE recovery_incidents SET last_error = ?, updated_at = ? WHERE id = ?")
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(incident_id)
        .execute(pool)
        .await
        .context("Failed to note incident error")?;
    Ok(())
}

/// Persist one board's sweep mutations atomically: every touched incident row
/// plus the restart attempts made this sweep. All or nothing per board.
pub async fn commit_board_changes(
    pool: &SqlitePool,
    incidents: &[RecoveryIncident],
    attempts: &[AttemptRecord],
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin board transaction")?;

    for incident in incidents {
        sqlx::query(
            "INSERT INTO recovery_incidents (
                id, organization_id, board_id, agent_id, status, reason, action,
                attempts, last_error, detected_at, recovered_at, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                reason = excluded.reason,
                action = excluded.action,
                attempts = excluded.attempts,
                last_error = excluded.last_error,
                recovered_at = excluded.recovered_at,
                updated_at = excluded.updated_at",
        )
        .bind(&incident.id)
        .bind(&incident.organization_id)
        .bind(incident.board_id.as_deref())
        .bind(incident.agent_id.as_deref())
        .bind(incident.status.as_db())
        .bind(&incident.reason)
        .bind(incident.action.map(RecoveryAction::as_db))
        .bind(incident.attempts)
        .bind(incident.last_error.as_deref())
        .bind(incident.detected_at.to_rfc3339())
        .bind(incident.recovered_at.map(|t| t.to_rfc3339()))
        .bind(incident.created_at.to_rfc3339())
        .bind(incident.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to persist incident")?;
    }

    for attempt in attempts {
        sqlx::query(
            "INSERT INTO recovery_attempts (id, agent_id, incident_id, attempted_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&attempt.agent_id)
        .bind(&attempt.incident_id)
        .bind(attempt.attempted_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to persist restart attempt")?;
    }

    tx.commit()
        .await
        .context("Failed to commit board transaction")?;
    Ok(())
}

fn row_to_policy(row: &SqliteRow) -> Result<RecoveryPolicy> {
    Ok(RecoveryPolicy {
        organization_id: row.try_get("organization_id")?,
        enabled: row.try_get("enabled")?,
        stale_after_seconds: row.try_get("stale_after_seconds")?,
        max_restarts_per_hour: row.try_get("max_restarts_per_hour")?,
        cooldown_seconds: row.try_get("cooldown_seconds")?,
        alert_dedupe_seconds: row.try_get("alert_dedupe_seconds")?,
        alert_telegram: row.try_get("alert_telegram")?,
        alert_whatsapp: row.try_get("alert_whatsapp")?,
        alert_ui: row.try_get("alert_ui")?,
    })
}

fn row_to_incident(row: &SqliteRow) -> Result<RecoveryIncident> {
    let status: String = row.try_get("status")?;
    let action: Option<String> = row.try_get("action")?;
    Ok(RecoveryIncident {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        board_id: row.try_get("board_id")?,
        agent_id: row.try_get("agent_id")?,
        status: IncidentStatus::from_db(&status),
        reason: row.try_get("reason")?,
        action: action.as_deref().map(RecoveryAction::from_db),
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        detected_at: parse_rfc3339(&row.try_get::<String, _>("detected_at")?)?,
        recovered_at: parse_rfc3339_opt(row.try_get("recovered_at")?)?,
        created_at: parse_rfc3339(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_rfc3339(&row.try_get::<String, _>("updated_at")?)?,
    })
}
