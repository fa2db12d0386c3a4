use super::warden_harness::{
    ScriptedRuntime, count_rows, heartbeat_at, migrated_pool, scheduler_with_alerts, seed_board,
    sweep_all,
};
use chrono::{Duration, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use warden::config::{AlertsConfig, RecoveryDefaults};
use warden::recovery::RecoveryPolicy;
use warden::recovery::repository::upsert_policy;
use warden::tenancy::repository as tenancy_repo;

async fn seed_stale_agent(
    pool: &sqlx::SqlitePool,
    runtime: &ScriptedRuntime,
) -> (String, String, String) {
    let (org, board) = seed_board(pool, "acme", "ops").await;
    let agent = tenancy_repo::create_agent(pool, &board.id, &org.id, "scout", Some("sess-1"))
        .await
        .unwrap();
    runtime.mark_reachable("sess-1");
    heartbeat_at(pool, &agent.id, Utc::now() - Duration::minutes(20)).await;
    (org.id, board.id, agent.id)
}

#[tokio::test]
async fn relay_receives_the_alert_and_dedupe_holds_the_next_one() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org_id, board_id, agent_id) = seed_stale_agent(&pool, &runtime).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay/telegram"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let alerts = AlertsConfig {
        telegram_webhook_url: Some(format!("{}/relay/telegram", server.uri())),
        whatsapp_webhook_url: None,
    };
    let scheduler = scheduler_with_alerts(&pool, &runtime, RecoveryDefaults::default(), &alerts);

    let first = sweep_all(&scheduler).await;
    assert_eq!(first.alerts_sent, 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["organization_id"], org_id.as_str());
    assert_eq!(body["board_id"], board_id.as_str());
    assert_eq!(body["agent_id"], agent_id.as_str());
    assert_eq!(body["agent_name"], "scout");
    assert_eq!(body["reason"], "stale_heartbeat");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("restart attempt 1")
    );

    // Same agent, same reason, still inside the dedupe window: every channel
    // stays quiet.
    let second = sweep_all(&scheduler).await;
    assert_eq!(second.alerts_sent, 0);
    assert_eq!(second.alerts_suppressed_dedupe, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // One audit row naming the channels that delivered, in dispatch order.
    let channels: String = sqlx::query_scalar("SELECT channels FROM alert_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(channels, "ui,telegram");
}

#[tokio::test]
async fn dead_relay_still_lands_the_ui_notification() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    seed_stale_agent(&pool, &runtime).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let alerts = AlertsConfig {
        telegram_webhook_url: Some(server.uri()),
        whatsapp_webhook_url: None,
    };
    let scheduler = scheduler_with_alerts(&pool, &runtime, RecoveryDefaults::default(), &alerts);

    let result = sweep_all(&scheduler).await;
    assert_eq!(result.alerts_sent, 1);
    assert_eq!(count_rows(&pool, "notifications").await, 1);

    let channels: String = sqlx::query_scalar("SELECT channels FROM alert_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(channels, "ui");
}

#[tokio::test]
async fn policy_with_every_channel_off_skips_alerting_but_still_restarts() {
    let pool = migrated_pool().await;
    let runtime = ScriptedRuntime::new();
    let (org_id, _board_id, agent_id) = seed_stale_agent(&pool, &runtime).await;

    let defaults = RecoveryDefaults::default();
    let mut policy = RecoveryPolicy::from_defaults(&org_id, &defaults);
    policy.alert_ui = false;
    policy.alert_telegram = false;
    policy.alert_whatsapp = false;
    upsert_policy(&pool, &policy).await.unwrap();

    let scheduler = scheduler_with_alerts(&pool, &runtime, defaults, &AlertsConfig::default());
    let result = sweep_all(&scheduler).await;

    assert_eq!(result.alerts_sent, 0);
    assert_eq!(result.alerts_skipped_status, 1);
    assert_eq!(runtime.restarted_agents(), vec![agent_id]);
    assert_eq!(count_rows(&pool, "alert_log").await, 0);
    assert_eq!(count_rows(&pool, "notifications").await, 0);
}
