use crate::alerts::AlertRouter;
use crate::config::Config;
use crate::continuity::ContinuityProbe;
use crate::db::MigrationGate;
use crate::recovery::RecoveryScheduler;
use crate::runtime::{HttpRuntimeClient, NoopRuntime, RuntimeSessions};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Long-lived collaborators shared by the CLI commands and the daemon:
/// one pool, one runtime client, one readiness gate per process.
pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub runtime: Arc<dyn RuntimeSessions>,
    pub gate: Arc<MigrationGate>,
}

impl AppContext {
    pub async fn init(config: Config) -> Result<Self> {
        let pool = crate::db::open_pool(&config.db_path()).await?;
        let runtime = build_runtime(&config)?;
        let gate = Arc::new(MigrationGate::new(pool.clone()));
        Ok(Self {
            config: Arc::new(config),
            pool,
            runtime,
            gate,
        })
    }

    pub fn probe(&self) -> ContinuityProbe {
        ContinuityProbe::new(Arc::clone(&self.runtime))
    }

    pub fn scheduler(&self) -> Result<RecoveryScheduler> {
        let alerts = AlertRouter::from_config(&self.config.alerts, &self.pool)?;
        Ok(RecoveryScheduler::new(
            self.pool.clone(),
            self.probe(),
            Arc::clone(&self.runtime),
            alerts,
            Arc::clone(&self.gate),
            self.config.recovery.clone(),
        ))
    }
}

fn build_runtime(config: &Config) -> Result<Arc<dyn RuntimeSessions>> {
    Ok(match &config.runtime.base_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.runtime.request_timeout_seconds);
            Arc::new(HttpRuntimeClient::new(url, timeout)?)
        }
        None => {
            tracing::info!("No runtime backend configured; session probes disabled");
            Arc::new(NoopRuntime)
        }
    })
}
