use super::warden_harness::{
    ScriptedRuntime, heartbeat_at, migrated_pool, scheduler_for, seed_board, sweep_all,
};
use chrono::{Duration, Utc};

use warden::config::RecoveryDefaults;
use warden::recovery::repository::{find_open_incident, get_incident, upsert_policy};
use warden::recovery::{IncidentStatus, RecoveryAction, RecoveryPolicy};
use warden::tenancy::repository as tenancy_repo;

async fn stale_agent(
    pool: &sqlx::SqlitePool,
    runtime: &ScriptedRuntime,
    org_id: &str,
    board_id: &str,
    name: &str,
    session: &str,
) -> String {
    let agent = tenancy_repo::create_agent(pool, board_id, org_id, name, Some(session))
        .await
        .unwrap();
    runtime.mark_reachable(session);
    heartbeat_at(pool, &agent.id, Utc::now() - Duration::minutes(20)).await;
    agent.id
}

#[tokio::test]
async fn disabled_policy_suppresses_its_org_without_touching_the_other() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let defaults = RecoveryDefaults::default();

    let (org_a, board_a) = seed_board(&pool, "muted", "ops-a").await;
    let (org_b, board_b) = seed_board(&pool, "default", "ops-b").await;
    let agent_a = stale_agent(&pool, &runtime, &org_a.id, &board_a.id, "a", "sess-a").await;
    let agent_b = stale_agent(&pool, &runtime, &org_b.id, &board_b.id, "b", "sess-b").await;

    let mut muted = RecoveryPolicy::from_defaults(&org_a.id, &defaults);
    muted.enabled = false;
    upsert_policy(&pool, &muted).await.unwrap();

    let scheduler = scheduler_for(&pool, &runtime, defaults);
    let result = sweep_all(&scheduler).await;

    assert_eq!(result.board_count, 2);
    assert_eq!(result.incident_count, 2);
    assert_eq!(runtime.restarted_agents(), vec![agent_b.clone()]);

    let suppressed = result
        .incidents
        .iter()
        .find(|i| i.agent_id.as_deref() == Some(agent_a.as_str()))
        .unwrap();
    assert_eq!(suppressed.status, IncidentStatus::Suppressed);
    assert_eq!(suppressed.action, Some(RecoveryAction::None));
    assert_eq!(suppressed.attempts, 0);

    let recovering = find_open_incident(&pool, &agent_b).await.unwrap().unwrap();
    assert_eq!(recovering.status, IncidentStatus::Recovering);

    // The master switch stops restarts, not alerting: both orgs alerted.
    assert_eq!(result.alerts_sent, 2);
}

#[tokio::test]
async fn restart_budget_spans_sweeps_then_goes_alert_only() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let defaults = RecoveryDefaults::default();

    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent_id = stale_agent(&pool, &runtime, &org.id, &board.id, "flappy", "sess-1").await;

    let mut policy = RecoveryPolicy::from_defaults(&org.id, &defaults);
    policy.max_restarts_per_hour = 2;
    policy.cooldown_seconds = 0;
    policy.alert_dedupe_seconds = 0;
    upsert_policy(&pool, &policy).await.unwrap();

    let scheduler = scheduler_for(&pool, &runtime, defaults);

    let first = sweep_all(&scheduler).await;
    assert_eq!(first.alerts_sent, 1);
    let open = find_open_incident(&pool, &agent_id).await.unwrap().unwrap();
    assert_eq!(open.attempts, 1);

    let second = sweep_all(&scheduler).await;
    assert_eq!(second.alerts_sent, 1);
    assert_eq!(runtime.restarted_agents().len(), 2);

    // Budget spent: the third sweep alerts but does not restart, and the
    // incident closes as suppressed.
    let third = sweep_all(&scheduler).await;
    assert_eq!(third.alerts_sent, 1);
    assert_eq!(runtime.restarted_agents().len(), 2);

    let closed = get_incident(&pool, &open.id).await.unwrap().unwrap();
    assert_eq!(closed.status, IncidentStatus::Suppressed);
    assert_eq!(closed.action, Some(RecoveryAction::AlertOnly));
    assert_eq!(closed.attempts, 2);
}

#[tokio::test]
async fn cooldown_skips_the_restart_but_keeps_the_incident_open() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let defaults = RecoveryDefaults::default();

    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent_id = stale_agent(&pool, &runtime, &org.id, &board.id, "slow", "sess-1").await;

    let mut policy = RecoveryPolicy::from_defaults(&org.id, &defaults);
    policy.alert_dedupe_seconds = 0;
    upsert_policy(&pool, &policy).await.unwrap();

    let scheduler = scheduler_for(&pool, &runtime, defaults);

    sweep_all(&scheduler).await;
    assert_eq!(runtime.restarted_agents().len(), 1);

    // Second sweep lands inside the 300s cooldown left by the first restart.
    let second = sweep_all(&scheduler).await;
    assert_eq!(runtime.restarted_agents().len(), 1);
    assert_eq!(second.alerts_sent, 1);

    let incident = find_open_incident(&pool, &agent_id).await.unwrap().unwrap();
    assert_eq!(incident.status, IncidentStatus::Recovering);
    assert_eq!(incident.attempts, 1);
}

#[tokio::test]
async fn failed_restarts_at_the_ceiling_close_the_incident_as_failed() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let defaults = RecoveryDefaults::default();

    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent_id = stale_agent(&pool, &runtime, &org.id, &board.id, "broken", "sess-1").await;

    let mut policy = RecoveryPolicy::from_defaults(&org.id, &defaults);
    policy.max_restarts_per_hour = 1;
    upsert_policy(&pool, &policy).await.unwrap();

    runtime.set_fail_restarts(true);
    let scheduler = scheduler_for(&pool, &runtime, defaults);
    sweep_all(&scheduler).await;

    let incident = sqlx::query_scalar::<_, String>(
        "SELECT status FROM recovery_incidents WHERE agent_id = ?",
    )
    .bind(&agent_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(incident, "failed");

    let last_error = sqlx::query_scalar::<_, Option<String>>(
        "SELECT last_error FROM recovery_incidents WHERE agent_id = ?",
    )
    .bind(&agent_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(last_error.unwrap().contains("spawn rejected"));
}
