use super::warden_harness::{
    ScriptedRuntime, heartbeat_at, migrated_pool, scheduler_for, seed_board, sweep, sweep_all,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

use warden::config::{HeartbeatConfig, RecoveryDefaults};
use warden::continuity::{Continuity, ContinuityProbe};
use warden::heartbeat::HeartbeatGuard;
use warden::recovery::repository::find_open_incident;
use warden::recovery::{IncidentStatus, SweepScope};
use warden::runtime::RuntimeSessions;
use warden::tenancy::repository as tenancy_repo;

#[tokio::test]
async fn stale_agent_goes_through_detect_restart_recover() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(&pool, &board.id, &org.id, "scout", Some("sess-1"))
        .await
        .unwrap();
    runtime.mark_reachable("sess-1");
    heartbeat_at(&pool, &agent.id, Utc::now() - Duration::minutes(20)).await;

    let scheduler = scheduler_for(&pool, &runtime, RecoveryDefaults::default());

    let first = sweep_all(&scheduler).await;
    assert_eq!(first.board_count, 1);
    assert_eq!(first.incident_count, 1);
    assert_eq!(first.alerts_sent, 1);
    assert_eq!(runtime.restarted_agents(), vec![agent.id.clone()]);

    let open = find_open_incident(&pool, &agent.id).await.unwrap().unwrap();
    assert_eq!(open.status, IncidentStatus::Recovering);
    assert_eq!(open.reason, "stale_heartbeat");
    assert_eq!(open.attempts, 1);
    assert_eq!(open.organization_id, org.id);
    assert_eq!(open.board_id.as_deref(), Some(board.id.as_str()));

    // The restarted agent reports again; the next sweep closes the incident.
    heartbeat_at(&pool, &agent.id, Utc::now()).await;
    let second = sweep_all(&scheduler).await;
    assert_eq!(second.incident_count, 0);
    assert_eq!(second.alerts_sent, 0);

    assert!(find_open_incident(&pool, &agent.id).await.unwrap().is_none());
    let closed = &second.incidents[0];
    assert_eq!(closed.id, open.id);
    assert_eq!(closed.status, IncidentStatus::Recovered);
    assert!(closed.recovered_at.is_some());
    assert_eq!(closed.attempts, 1);

    // One alert for the whole episode, one UI notification behind it.
    let alerts = super::warden_harness::count_rows(&pool, "alert_log").await;
    assert_eq!(alerts, 1);
    let notifications = super::warden_harness::count_rows(&pool, "notifications").await;
    assert_eq!(notifications, 1);
}

#[tokio::test]
async fn lost_session_is_flagged_even_with_a_fresh_heartbeat() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(&pool, &board.id, &org.id, "relay", Some("sess-gone"))
        .await
        .unwrap();
    heartbeat_at(&pool, &agent.id, Utc::now()).await;

    let scheduler = scheduler_for(&pool, &runtime, RecoveryDefaults::default());
    let result = sweep_all(&scheduler).await;

    assert_eq!(result.incident_count, 1);
    let incident = find_open_incident(&pool, &agent.id).await.unwrap().unwrap();
    assert_eq!(incident.reason, "session_unreachable");
    assert_eq!(incident.status, IncidentStatus::Recovering);
    assert_eq!(runtime.restarted_agents(), vec![agent.id]);
}

#[tokio::test]
async fn agent_that_never_reported_is_flagged_never_seen() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(&pool, &board.id, &org.id, "ghost", None)
        .await
        .unwrap();

    let scheduler = scheduler_for(&pool, &runtime, RecoveryDefaults::default());
    let result = sweep(&scheduler, &SweepScope::Board(board.id.clone())).await;

    assert_eq!(result.incident_count, 1);
    let incident = find_open_incident(&pool, &agent.id).await.unwrap().unwrap();
    assert_eq!(incident.reason, "never_seen");
}

#[tokio::test]
async fn heartbeat_guard_collapses_duplicate_beats_before_classification() {
    let pool = migrated_pool().await;
    let (org, board) = seed_board(&pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(&pool, &board.id, &org.id, "beacon", None)
        .await
        .unwrap();

    let guard = HeartbeatGuard::new(&HeartbeatConfig {
        min_interval_seconds: 60,
        jitter_seconds: 0,
        singleflight_enabled: true,
    });

    let first_seen = Utc::now();
    let verdict = guard
        .execute(
            &agent.id,
            || async {
                heartbeat_at(&pool, &agent.id, first_seen).await;
                "accepted"
            },
            || async { "deduped" },
        )
        .await;
    assert_eq!(verdict, "accepted");

    // A second beat inside the cadence window must not touch the row; give it
    // an older timestamp so a stray write would be visible.
    let decoy = first_seen - Duration::minutes(5);
    let verdict = guard
        .execute(
            &agent.id,
            || async {
                heartbeat_at(&pool, &agent.id, decoy).await;
                "accepted"
            },
            || async { "deduped" },
        )
        .await;
    assert_eq!(verdict, "deduped");

    let loaded = tenancy_repo::get_agent(&pool, &agent.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.last_seen_at, Some(first_seen));

    let runtime = ScriptedRuntime::new();
    let probe = ContinuityProbe::new(Arc::clone(&runtime) as Arc<dyn RuntimeSessions>);
    let reading = probe.classify(&loaded, 900, Utc::now()).await;
    assert_eq!(reading.continuity, Continuity::Alive);
}

#[tokio::test]
async fn board_snapshot_tallies_every_bucket() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org, board) = seed_board(&pool, "acme", "ops").await;

    let alive = tenancy_repo::create_agent(&pool, &board.id, &org.id, "alive", Some("sess-a"))
        .await
        .unwrap();
    runtime.mark_reachable("sess-a");
    heartbeat_at(&pool, &alive.id, Utc::now()).await;

    let stale = tenancy_repo::create_agent(&pool, &board.id, &org.id, "stale", Some("sess-b"))
        .await
        .unwrap();
    runtime.mark_reachable("sess-b");
    heartbeat_at(&pool, &stale.id, Utc::now() - Duration::minutes(30)).await;

    let lost = tenancy_repo::create_agent(&pool, &board.id, &org.id, "lost", Some("sess-c"))
        .await
        .unwrap();
    heartbeat_at(&pool, &lost.id, Utc::now()).await;

    let probe = ContinuityProbe::new(Arc::clone(&runtime) as Arc<dyn RuntimeSessions>);
    let snapshot = probe
        .snapshot_for_board(&pool, &board.id, &RecoveryDefaults::default())
        .await
        .unwrap();

    assert_eq!(snapshot.board_id, board.id);
    assert!(snapshot.runtime_error.is_none());
    assert_eq!(snapshot.counts.alive, 1);
    assert_eq!(snapshot.counts.stale, 1);
    assert_eq!(snapshot.counts.unreachable, 1);
    assert_eq!(snapshot.agents.len(), 3);

    let lost_reading = snapshot
        .agents
        .iter()
        .find(|reading| reading.agent_id == lost.id)
        .unwrap();
    assert_eq!(lost_reading.reason, "session_unreachable");
    assert!(!lost_reading.runtime_reachable);
}
