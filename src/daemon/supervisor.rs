use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keep a daemon component running: relaunch it with exponential backoff when
/// it fails, open the circuit after too many consecutive failures, and stop
/// restarting once shutdown has been requested. Components observe the same
/// token and are expected to return `Ok(())` promptly when it fires.
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    max_restarts: u32,
    cancel: CancellationToken,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!("Daemon component '{name}' starting");
            match run_component().await {
                Ok(()) if cancel.is_cancelled() => {
                    tracing::info!("Daemon component '{name}' stopped");
                    break;
                }
                Ok(()) => {
                    tracing::warn!("Daemon component '{name}' exited unexpectedly");
                    backoff = initial_backoff_secs.max(1);
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
                Err(e) => {
                    tracing::error!("Daemon component '{name}' failed: {e:#}");
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
            }

            if max_restarts > 0 && consecutive_failures > max_restarts {
                tracing::error!(
                    "Daemon component '{name}' exceeded max restarts ({max_restarts}), circuit open"
                );
                crate::diagnostics::health::mark_component_error(name, "restart circuit open");
                break;
            }

            crate::diagnostics::health::bump_component_restart(name);
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(backoff)) => {}
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}
