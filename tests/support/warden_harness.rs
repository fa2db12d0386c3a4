#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use warden::alerts::AlertRouter;
use warden::config::{AlertsConfig, RecoveryDefaults};
use warden::continuity::ContinuityProbe;
use warden::db::{MigrationGate, apply_migrations, open_memory_pool};
use warden::error::RuntimeError;
use warden::recovery::{RecoveryScheduler, SweepOutcome, SweepResult, SweepScope};
use warden::runtime::{RuntimeSessions, SessionProbe};
use warden::tenancy::{Board, Organization, repository as tenancy_repo};

/// Runtime backend stand-in the tests steer between sweeps: which sessions
/// answer, whether restarts succeed, and a log of every restart asked for.
pub struct ScriptedRuntime {
    reachable: Mutex<HashSet<String>>,
    fail_restarts: AtomicBool,
    restarts: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: Mutex::new(HashSet::new()),
            fail_restarts: AtomicBool::new(false),
            restarts: Mutex::new(Vec::new()),
        })
    }

    pub fn mark_reachable(&self, session_id: &str) {
        self.lock_reachable().insert(session_id.to_string());
    }

    pub fn mark_unreachable(&self, session_id: &str) {
        self.lock_reachable().remove(session_id);
    }

    pub fn set_fail_restarts(&self, fail: bool) {
        self.fail_restarts.store(fail, Ordering::SeqCst);
    }

    pub fn restarted_agents(&self) -> Vec<String> {
        self.restarts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_reachable(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.reachable.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RuntimeSessions for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn check_session(&self, session_id: &str) -> Result<SessionProbe, RuntimeError> {
        if self.lock_reachable().contains(session_id) {
            Ok(SessionProbe::reachable())
        } else {
            Ok(SessionProbe::unreachable("session not found"))
        }
    }

    async fn restart_agent(
        &self,
        agent_id: &str,
        _session_id: Option<&str>,
    ) -> Result<(), RuntimeError> {
        self.restarts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(agent_id.to_string());
        if self.fail_restarts.load(Ordering::SeqCst) {
            return Err(RuntimeError::Restart {
                agent_id: agent_id.to_string(),
                message: "spawn rejected".into(),
            });
        }
        Ok(())
    }
}

pub async fn migrated_pool() -> SqlitePool {
    let pool = open_memory_pool()
        .await
        .expect("in-memory pool should open");
    apply_migrations(&pool)
        .await
        .expect("migrations should apply");
    pool
}

/// Scheduler wired the way `warden sweep` wires it, with the UI channel only
/// (no relay URLs configured).
pub fn scheduler_for(
    pool: &SqlitePool,
    runtime: &Arc<ScriptedRuntime>,
    defaults: RecoveryDefaults,
) -> RecoveryScheduler {
    scheduler_with_alerts(pool, runtime, defaults, &AlertsConfig::default())
}

pub fn scheduler_with_alerts(
    pool: &SqlitePool,
    runtime: &Arc<ScriptedRuntime>,
    defaults: RecoveryDefaults,
    alerts: &AlertsConfig,
) -> RecoveryScheduler {
    let runtime: Arc<dyn RuntimeSessions> = Arc::clone(runtime) as Arc<dyn RuntimeSessions>;
    let router = AlertRouter::from_config(alerts, pool).expect("alert router should build");
    RecoveryScheduler::new(
        pool.clone(),
        ContinuityProbe::new(Arc::clone(&runtime)),
        runtime,
        router,
        Arc::new(MigrationGate::new(pool.clone())),
        defaults,
    )
}

pub async fn seed_board(pool: &SqlitePool, org_name: &str, board_name: &str) -> (Organization, Board) {
    let org = tenancy_repo::create_organization(pool, org_name)
        .await
        .expect("organization should insert");
    let board = tenancy_repo::create_board(pool, &org.id, board_name)
        .await
        .expect("board should insert");
    (org, board)
}

/// Backdated heartbeat: the agent reported at `seen_at` and not since.
pub async fn heartbeat_at(pool: &SqlitePool, agent_id: &str, seen_at: DateTime<Utc>) {
    tenancy_repo::record_heartbeat(pool, agent_id, seen_at)
        .await
        .expect("heartbeat should record");
}

pub async fn sweep_all(scheduler: &RecoveryScheduler) -> SweepResult {
    sweep(scheduler, &SweepScope::AllBoards).await
}

pub async fn sweep(scheduler: &RecoveryScheduler, scope: &SweepScope) -> SweepResult {
    match scheduler
        .run_once(scope, &CancellationToken::new())
        .await
        .expect("sweep should not error")
    {
        SweepOutcome::Completed(result) => result,
        SweepOutcome::NotReady => panic!("sweep refused: schema not ready"),
    }
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS n FROM {table}");
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool)
        .await
        .expect("count query should run")
}
