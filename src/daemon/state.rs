use crate::config::Config;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Health snapshot as flushed to disk, so `warden status` can read daemon
/// state from another process.
#[derive(Debug, Clone, serde::Serialize)]
pub(super) struct DaemonState {
    #[serde(flatten)]
    snapshot: serde_json::Map<String, serde_json::Value>,
    written_at: String,
}

pub(super) fn state_file_path(config: &Config) -> PathBuf {
    config
        .config_path
        .parent()
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join("daemon_state.json")
}

async fn write_state(path: &Path) {
    let mut json = crate::diagnostics::health::snapshot_json();
    if let Some(snapshot) = json.as_object().cloned() {
        let state = DaemonState {
            snapshot,
            written_at: Utc::now().to_rfc3339(),
        };
        json = serde_json::to_value(state).unwrap_or_else(|_| serde_json::json!({}));
    }

    let data = serde_json::to_vec_pretty(&json).unwrap_or_else(|_| b"{}".to_vec());
    if let Err(error) = tokio::fs::write(path, data).await {
        tracing::warn!(%error, "failed to write daemon state file");
    }
}

pub(super) fn spawn_state_writer(config: Arc<Config>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = state_file_path(&config);
        if let Some(parent) = path.parent()
            && let Err(error) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(%error, "failed to create state file directory");
        }

        let mut interval = tokio::time::interval(Duration::from_secs(super::STATUS_FLUSH_SECONDS));
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    // Final flush so status shows the shutdown marks.
                    write_state(&path).await;
                    return;
                }
                _ = interval.tick() => {}
            }
            write_state(&path).await;
        }
    })
}
