use crate::app::context::AppContext;
use serde_json::Value;

/// Assemble the `warden status` report: configuration facts, schema
/// readiness, and (when a daemon has been running) its last health flush.
pub async fn render_status(ctx: &AppContext) -> String {
    let config = &ctx.config;
    let applied = crate::db::applied_revision(&ctx.pool).await.ok().flatten();
    let expected = crate::db::expected_head_revision();

    let mut lines = vec![
        "◆ Warden status".to_string(),
        String::new(),
        format!("version     {}", env!("CARGO_PKG_VERSION")),
        format!("config      {}", config.config_path.display()),
        format!("database    {}", config.db_path().display()),
        format!(
            "schema      {}",
            match applied.as_deref() {
                Some(revision) if revision == expected => format!("{revision} (ready)"),
                Some(revision) => format!("{revision} (expected {expected}; run `warden migrate`)"),
                None => format!("not migrated (expected {expected}; run `warden migrate`)"),
            }
        ),
        String::new(),
        format!(
            "heartbeat   min interval {}s, jitter {}s, singleflight {}",
            config.heartbeat.min_interval_seconds,
            config.heartbeat.jitter_seconds,
            if config.heartbeat.singleflight_enabled {
                "on"
            } else {
                "off"
            }
        ),
        format!("sweep       every {}s", config.sweep.interval_seconds),
        format!(
            "runtime     {}",
            config.runtime.base_url.as_deref().map_or_else(
                || "not configured (session probes disabled)".to_string(),
                |url| format!(
                    "{url} (timeout {}s)",
                    config.runtime.request_timeout_seconds
                ),
            )
        ),
        format!(
            "recovery    {}, stale after {}s, {} restarts/h, cooldown {}s, dedupe {}s",
            if config.recovery.enabled {
                "enabled"
            } else {
                "disabled"
            },
            config.recovery.stale_after_seconds,
            config.recovery.max_restarts_per_hour,
            config.recovery.cooldown_seconds,
            config.recovery.alert_dedupe_seconds
        ),
        String::new(),
        "alert channels".to_string(),
        format!(
            "  ui        {}",
            if config.recovery.alert_ui {
                "✓ enabled (notification rows)"
            } else {
                "✗ disabled"
            }
        ),
    ];

    for (name, relay, enabled) in [
        (
            "telegram",
            config.alerts.telegram_webhook_url.is_some(),
            config.recovery.alert_telegram,
        ),
        (
            "whatsapp",
            config.alerts.whatsapp_webhook_url.is_some(),
            config.recovery.alert_whatsapp,
        ),
    ] {
        lines.push(format!(
            "  {name:9} {}",
            match (relay, enabled) {
                (true, true) => "✓ relay configured",
                (true, false) => "✗ relay configured but disabled by policy default",
                (false, _) => "✗ no relay configured",
            }
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "telemetry   {}",
        match (&config.telemetry.run_id, &config.telemetry.organization_id) {
            (Some(run), Some(org)) => format!("run {run} (org {org})"),
            _ => "not configured".to_string(),
        }
    ));

    lines.push(String::new());
    match read_daemon_state(config).await {
        Some(state) => {
            lines.push(format!(
                "daemon      state written at {}",
                state
                    .get("written_at")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ));
            lines.extend(component_lines(&state));
        }
        None => lines.push("daemon      not running (no state file)".to_string()),
    }

    lines.join("\n")
}

async fn read_daemon_state(config: &crate::config::Config) -> Option<Value> {
    let path = crate::daemon::state_file_path(config);
    let data = tokio::fs::read(&path).await.ok()?;
    serde_json::from_slice(&data).ok()
}

fn component_lines(state: &Value) -> Vec<String> {
    let Some(components) = state.get("components").and_then(Value::as_object) else {
        return Vec::new();
    };
    components
        .iter()
        .map(|(name, health)| {
            let status = health
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let restarts = health
                .get("restart_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            match health.get("last_error").and_then(Value::as_str) {
                Some(error) => format!("  {name:9} {status} ({error}; restarts {restarts})"),
                None => format!("  {name:9} {status} (restarts {restarts})"),
            }
        })
        .collect()
}
