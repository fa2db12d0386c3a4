use crate::app::context::AppContext;
use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod state;
mod supervisor;
mod sweep_worker;

const STATUS_FLUSH_SECONDS: u64 = 5;
const INITIAL_BACKOFF_SECONDS: u64 = 1;
const MAX_BACKOFF_SECONDS: u64 = 60;
const MAX_COMPONENT_RESTARTS: u32 = 10;

/// Where the daemon drops its periodic health snapshot for `warden status`.
pub fn state_file_path(config: &Config) -> PathBuf {
    state::state_file_path(config)
}

/// Long-running mode: supervised periodic sweeps until Ctrl+C. Shutdown is
/// cooperative — the in-flight board finishes before the worker exits.
pub async fn run(ctx: AppContext) -> Result<()> {
    let scheduler = Arc::new(ctx.scheduler()?);
    if !ctx.gate.is_ready().await {
        tracing::warn!("Schema is not ready; sweeps will be skipped until `warden migrate` runs");
    }
    crate::diagnostics::health::mark_component_ok("daemon");

    let cancel = CancellationToken::new();
    let interval = ctx.config.sweep.interval_seconds;
    let worker_pool = ctx.pool.clone();
    let telemetry = ctx.config.telemetry.clone();
    let worker_cancel = cancel.clone();
    let mut handles: Vec<JoinHandle<()>> =
        vec![state::spawn_state_writer(Arc::clone(&ctx.config), cancel.clone())];
    handles.push(supervisor::spawn_component_supervisor(
        "sweep",
        INITIAL_BACKOFF_SECONDS,
        MAX_BACKOFF_SECONDS,
        MAX_COMPONENT_RESTARTS,
        cancel.clone(),
        move || {
            let scheduler = Arc::clone(&scheduler);
            let pool = worker_pool.clone();
            let telemetry = telemetry.clone();
            let cancel = worker_cancel.clone();
            async move {
                sweep_worker::run_sweep_worker(scheduler, pool, telemetry, interval, cancel).await
            }
        },
    ));

    println!("◆ Warden daemon started");
    println!("   sweep interval: {interval}s");
    println!("   Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested; letting the current board finish");
    crate::diagnostics::health::mark_component_error("daemon", "shutdown requested");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
