use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{OnceLock, RwLock};
use std::time::Instant;

/// Process-wide component health registry. Daemon workers mark themselves
/// ok/error as they tick; `warden status` renders the snapshot. State lives
/// for the process lifetime only and is never persisted.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComponentStatus {
    Starting,
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub updated_at: String,
    pub last_ok: Option<String>,
    pub last_error: Option<String>,
    pub restart_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub pid: u32,
    pub updated_at: String,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
    /// Counters from the most recent completed sweep, if any.
    pub last_sweep: Option<serde_json::Value>,
}

struct HealthRegistry {
    started_at: Instant,
    components: RwLock<BTreeMap<String, ComponentHealth>>,
    last_sweep: RwLock<Option<serde_json::Value>>,
}

static REGISTRY: OnceLock<HealthRegistry> = OnceLock::new();

fn registry() -> &'static HealthRegistry {
    REGISTRY.get_or_init(|| HealthRegistry {
        started_at: Instant::now(),
        components: RwLock::new(BTreeMap::new()),
        last_sweep: RwLock::new(None),
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn upsert_component<F>(component: &str, update: F)
where
    F: FnOnce(&mut ComponentHealth),
{
    if let Ok(mut map) = registry().components.write() {
        let now = now_rfc3339();
        let entry = map
            .entry(component.to_string())
            .or_insert_with(|| ComponentHealth {
                status: ComponentStatus::Starting,
                updated_at: now.clone(),
                last_ok: None,
                last_error: None,
                restart_count: 0,
            });
        update(entry);
        entry.updated_at = now;
    }
}

pub fn mark_component_ok(component: &str) {
    upsert_component(component, |entry| {
        entry.status = ComponentStatus::Ok;
        entry.last_ok = Some(now_rfc3339());
        entry.last_error = None;
    });
}

#[allow(clippy::needless_pass_by_value)]
pub fn mark_component_error(component: &str, error: impl ToString) {
    let err = error.to_string();
    upsert_component(component, move |entry| {
        entry.status = ComponentStatus::Error;
        entry.last_error = Some(err);
    });
}

/// Called by the daemon supervisor each time it relaunches a component.
pub fn bump_component_restart(component: &str) {
    upsert_component(component, |entry| {
        entry.restart_count = entry.restart_count.saturating_add(1);
    });
}

/// Stash the counters of a completed sweep for the status surface.
pub fn record_sweep(result: &crate::recovery::SweepResult) {
    if let Ok(mut slot) = registry().last_sweep.write() {
        *slot = serde_json::to_value(result).ok();
    }
}

pub fn snapshot() -> HealthSnapshot {
    let components = registry()
        .components
        .read()
        .map_or_else(|_| BTreeMap::new(), |map| map.clone());
    let last_sweep = registry()
        .last_sweep
        .read()
        .map_or_else(|_| None, |slot| slot.clone());

    HealthSnapshot {
        pid: std::process::id(),
        updated_at: now_rfc3339(),
        uptime_seconds: registry().started_at.elapsed().as_secs(),
        components,
        last_sweep,
    }
}

pub fn snapshot_json() -> serde_json::Value {
    serde_json::to_value(snapshot()).unwrap_or_else(|_| {
        serde_json::json!({
            "status": "error",
            "message": "failed to serialize health snapshot"
        })
    })
}
