use crate::config::TelemetryConfig;
use crate::diagnostics::health;
use crate::recovery::{RecoveryScheduler, SweepOutcome, SweepScope};
use crate::telemetry::{MetricsUpdate, sync_run_metrics};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodic sweep loop: one `run_once` per tick, awaited to completion so
/// sweeps never overlap. Returns when shutdown is requested; lets a
/// process-level fault (scope enumeration against a dead database) propagate
/// so the supervisor applies backoff before the next launch.
pub(super) async fn run_sweep_worker(
    scheduler: Arc<RecoveryScheduler>,
    pool: SqlitePool,
    telemetry: TelemetryConfig,
    interval_seconds: u64,
    cancel: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Sweep worker stopping");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let outcome = match scheduler.run_once(&SweepScope::AllBoards, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                health::mark_component_error("sweep", e.to_string());
                return Err(e);
            }
        };

        match outcome {
            SweepOutcome::NotReady => {
                health::mark_component_error("sweep", "database schema not ready");
                tracing::warn!("Sweep skipped: schema not ready (run `warden migrate`)");
            }
            SweepOutcome::Completed(result) => {
                health::mark_component_ok("sweep");
                health::record_sweep(&result);
                fold_into_run_record(&pool, &telemetry, &MetricsUpdate::from_sweep(&result)).await;
            }
        }
    }
}

/// Push sweep counters onto the configured telemetry run, when one is set.
/// Sync problems never bubble into the sweep loop.
async fn fold_into_run_record(pool: &SqlitePool, telemetry: &TelemetryConfig, update: &MetricsUpdate) {
    let (Some(run_id), Some(org_id)) = (&telemetry.run_id, &telemetry.organization_id) else {
        return;
    };
    match sync_run_metrics(pool, run_id, org_id, None, update, Utc::now()).await {
        Ok(Some(_)) => {
            health::mark_component_ok("telemetry");
        }
        Ok(None) => {
            health::mark_component_error("telemetry", "configured run out of scope");
        }
        Err(e) => {
            health::mark_component_error("telemetry", e.to_string());
            tracing::warn!("Telemetry sync failed: {e:#}");
        }
    }
}
