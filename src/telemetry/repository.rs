use super::aggregate::MetricsSnapshot;
use crate::error::TelemetryError;
use crate::util::parse_rfc3339;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A long-lived telemetry run that sweep counters accumulate onto.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub organization_id: String,
    pub board_id: Option<String>,
    pub kind: String,
    pub metrics: MetricsSnapshot,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn create_run(
    pool: &SqlitePool,
    organization_id: &str,
    board_id: Option<&str>,
) -> Result<RunRecord> {
    let now = Utc::now();
    let run = RunRecord {
        id: Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        board_id: board_id.map(ToString::to_string),
        kind: "continuity".to_string(),
        metrics: MetricsSnapshot::new(),
        started_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO runs (id, organization_id, board_id, kind, metrics, started_at, updated_at)
         VALUES (?, ?, ?, ?, '{}', ?, ?)",
    )
    .bind(&run.id)
    .bind(&run.organization_id)
    .bind(run.board_id.as_deref())
    .bind(&run.kind)
    .bind(run.started_at.to_rfc3339())
    .bind(run.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to insert run record")?;
    Ok(run)
}

pub async fn get_run(pool: &SqlitePool, run_id: &str) -> Result<Option<RunRecord>> {
    let row = sqlx::query(
        "SELECT id, organization_id, board_id, kind, metrics, started_at, updated_at
         FROM runs WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await
    .context("Failed to load run record")?;
    row.as_ref().map(row_to_run).transpose()
}

/// `get_run` for callers that treat a missing run as an error (status display,
/// operator tooling). The sync path uses `get_run` and degrades instead.
pub async fn require_run(pool: &SqlitePool, run_id: &str) -> Result<RunRecord> {
    get_run(pool, run_id)
        .await?
        .ok_or_else(|| TelemetryError::RunNotFound(run_id.to_string()).into())
}

pub async fn update_run_metrics(
    pool: &SqlitePool,
    run_id: &str,
    metrics: &MetricsSnapshot,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let payload =
        serde_json::to_string(metrics).context("Failed to serialize metrics snapshot")?;
    sqlx::query("UPDATE runs SET metrics = ?, updated_at = ? WHERE id = ?")
        .bind(payload)
        .bind(updated_at.to_rfc3339())
        .bind(run_id)
        .execute(pool)
        .await
        .context("Failed to update run metrics")?;
    Ok(())
}

fn row_to_run(row: &SqliteRow) -> Result<RunRecord> {
    let raw_metrics: String = row.try_get("metrics")?;
    let metrics: MetricsSnapshot = serde_json::from_str(&raw_metrics)
        .map_err(|e| TelemetryError::Decode(e.to_string()))?;
    Ok(RunRecord {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        board_id: row.try_get("board_id")?,
        kind: row.try_get("kind")?,
        metrics,
        started_at: parse_rfc3339(&row.try_get::<String, _>("started_at")?)?,
        updated_at: parse_rfc3339(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{apply_migrations, open_memory_pool};
    use serde_json::Value;

    async fn pool() -> SqlitePool {
        let pool = open_memory_pool().await.unwrap();
        apply_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let pool = pool().await;
        let run = create_run(&pool, "org-1", Some("board-1")).await.unwrap();

        let loaded = get_run(&pool, &run.id).await.unwrap().unwrap();
        assert_eq!(loaded.organization_id, "org-1");
        assert_eq!(loaded.board_id.as_deref(), Some("board-1"));
        assert_eq!(loaded.kind, "continuity");
        assert!(loaded.metrics.is_empty());
    }

    #[tokio::test]
    async fn missing_run_is_none_but_require_errors() {
        let pool = pool().await;
        assert!(get_run(&pool, "nope").await.unwrap().is_none());
        let err = require_run(&pool, "nope").await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn metrics_update_persists_and_bumps_timestamp() {
        let pool = pool().await;
        let run = create_run(&pool, "org-1", None).await.unwrap();

        let mut metrics = MetricsSnapshot::new();
        metrics.insert("sweeps_total".to_string(), Value::from(4));
        let later = run.updated_at + chrono::Duration::seconds(30);
        update_run_metrics(&pool, &run.id, &metrics, later).await.unwrap();

        let loaded = get_run(&pool, &run.id).await.unwrap().unwrap();
        assert_eq!(loaded.metrics["sweeps_total"], Value::from(4));
        assert_eq!(loaded.updated_at, later);
    }

    #[tokio::test]
    async fn malformed_metrics_column_is_a_decode_error() {
        let pool = pool().await;
        let run = create_run(&pool, "org-1", None).await.unwrap();
        sqlx::query("UPDATE runs SET metrics = 'not json' WHERE id = ?")
            .bind(&run.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = get_run(&pool, &run.id).await.unwrap_err();
        assert!(err.to_string().contains("decode"));
    }
}
