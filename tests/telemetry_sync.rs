#[path = "support/warden_harness.rs"]
mod warden_harness;

use chrono::{Duration, Utc};
use serde_json::Value;
use warden_harness::{ScriptedRuntime, heartbeat_at, migrated_pool, scheduler_for, seed_board, sweep_all};

use warden::config::RecoveryDefaults;
use warden::telemetry::repository::{create_run, get_run};
use warden::telemetry::{MetricsUpdate, sync_run_metrics};
use warden::tenancy::repository as tenancy_repo;

fn get_i64(snapshot: &warden::telemetry::MetricsSnapshot, key: &str) -> i64 {
    snapshot.get(key).and_then(Value::as_i64).unwrap()
}

#[tokio::test]
async fn sweep_counters_fold_into_the_configured_run() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(&pool, &board.id, &org.id, "scout", Some("sess-1"))
        .await
        .unwrap();
    runtime.mark_reachable("sess-1");
    heartbeat_at(&pool, &agent.id, Utc::now() - Duration::minutes(20)).await;

    let run = create_run(&pool, &org.id, None).await.unwrap();
    let scheduler = scheduler_for(&pool, &runtime, RecoveryDefaults::default());

    let first = sweep_all(&scheduler).await;
    let merged = sync_run_metrics(
        &pool,
        &run.id,
        &org.id,
        None,
        &MetricsUpdate::from_sweep(&first),
        Utc::now(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(get_i64(&merged, "sweeps_total"), 1);
    assert_eq!(get_i64(&merged, "boards_swept"), 1);
    assert_eq!(get_i64(&merged, "incidents_flagged"), 1);
    assert_eq!(get_i64(&merged, "alerts_sent"), 1);

    // Second sweep: the agent is still stale but the alert dedupes, and the
    // counters keep accumulating on the same run.
    let second = sweep_all(&scheduler).await;
    let merged = sync_run_metrics(
        &pool,
        &run.id,
        &org.id,
        None,
        &MetricsUpdate::from_sweep(&second),
        Utc::now(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(get_i64(&merged, "sweeps_total"), 2);
    assert_eq!(get_i64(&merged, "alerts_sent"), 1);
    assert_eq!(get_i64(&merged, "alerts_suppressed_dedupe"), 1);

    // The merged snapshot is what the store now holds.
    let stored = get_run(&pool, &run.id).await.unwrap().unwrap();
    assert_eq!(stored.metrics, merged);
}

#[tokio::test]
async fn latency_and_failure_inputs_persist_as_derived_gauges() {
    let pool = migrated_pool().await;
    let (org, _board) = seed_board(&pool, "acme", "ops").await;
    let run = create_run(&pool, &org.id, None).await.unwrap();

    let update = MetricsUpdate {
        latency_samples_ms: Some(vec![120, 250, 310, 420, 510]),
        tool_failures: Some(2),
        tool_calls: Some(20),
        ..MetricsUpdate::default()
    };
    let merged = sync_run_metrics(&pool, &run.id, &org.id, None, &update, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(get_i64(&merged, "latency_p95_ms"), 510);
    assert!((merged["tool_failure_rate"].as_f64().unwrap() - 0.1).abs() < f64::EPSILON);

    let stored = get_run(&pool, &run.id).await.unwrap().unwrap();
    assert_eq!(get_i64(&stored.metrics, "latency_p95_ms"), 510);
    assert_eq!(get_i64(&stored.metrics, "tool_calls"), 20);
}

#[tokio::test]
async fn run_for_another_organization_is_never_written() {
    let pool = migrated_pool().await;
    let (org, _board) = seed_board(&pool, "acme", "ops").await;
    let run = create_run(&pool, &org.id, None).await.unwrap();

    let update = MetricsUpdate {
        sweeps: Some(1),
        ..MetricsUpdate::default()
    };
    let outcome = sync_run_metrics(&pool, &run.id, "someone-else", None, &update, Utc::now())
        .await
        .unwrap();
    assert!(outcome.is_none());

    let stored = get_run(&pool, &run.id).await.unwrap().unwrap();
    assert!(stored.metrics.is_empty());
}
