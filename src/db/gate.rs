use super::migrations;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};

/// Startup guard: schema-sensitive loops (the recovery sweep) must not run
/// until the database has been migrated to the revision this build expects.
///
/// The first successful check is cached for the life of the instance —
/// schema never regresses while a process is running, so later ticks skip
/// the round-trip. Construct one at startup and share it; `reset` exists for
/// test isolation only.
pub struct MigrationGate {
    pool: SqlitePool,
    ready: AtomicBool,
}

impl MigrationGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ready: AtomicBool::new(false),
        }
    }

    /// True only when the applied revision marker equals the manifest head.
    /// Query failures (connectivity, marker table missing) are logged and
    /// reported as not ready, never raised.
    pub async fn is_ready(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return true;
        }

        let expected = migrations::expected_head_revision();
        match migrations::applied_revision(&self.pool).await {
            Ok(Some(applied)) if applied == expected => {
                self.ready.store(true, Ordering::Release);
                true
            }
            Ok(applied) => {
                tracing::warn!(
                    "database schema not ready: applied={}, expected={expected}",
                    applied.as_deref().unwrap_or("none")
                );
                false
            }
            Err(e) => {
                tracing::warn!("schema readiness check failed: {e:#}");
                false
            }
        }
    }

    /// Forget the cached result so the next `is_ready` queries again.
    pub fn reset(&self) {
        self.ready.store(false, Ordering::Release);
    }
}
