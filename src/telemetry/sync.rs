use super::aggregate::{MetricsSnapshot, MetricsUpdate, aggregate};
use super::repository::{get_run, update_run_metrics};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Fold an update into the metrics snapshot of a run record.
///
/// Scope checks make this safe to call with operator-supplied configuration:
/// a run that is missing, belongs to another organization, or (when a board
/// scope is given) to another board is skipped with `None` rather than an
/// error. Database failures still propagate.
pub async fn sync_run_metrics(
    pool: &SqlitePool,
    run_id: &str,
    organization_id: &str,
    board_id: Option<&str>,
    update: &MetricsUpdate,
    now: DateTime<Utc>,
) -> Result<Option<MetricsSnapshot>> {
    let Some(run) = get_run(pool, run_id).await? else {
        tracing::warn!("telemetry sync skipped: run {run_id} not found");
        return Ok(None);
    };
    if run.organization_id != organization_id {
        tracing::warn!(
            "telemetry sync skipped: run {run_id} belongs to organization {}, expected {organization_id}",
            run.organization_id
        );
        return Ok(None);
    }
    if let Some(expected_board) = board_id
        && run.board_id.as_deref() != Some(expected_board)
    {
        tracing::warn!("telemetry sync skipped: run {run_id} is not scoped to board {expected_board}");
        return Ok(None);
    }

    if update.is_empty() {
        return Ok(Some(run.metrics));
    }

    let merged = aggregate(run.metrics, update);
    update_run_metrics(pool, run_id, &merged, now).await?;
    Ok(Some(merged))
}
