use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Warden.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WardenError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Store / persistence ─────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Runtime-session backend ─────────────────────────────────────────
    #[error("runtime: {0}")]
    Runtime(#[from] RuntimeError),

    // ── Alert dispatch ──────────────────────────────────────────────────
    #[error("alert: {0}")]
    Alert(#[from] AlertError),

    // ── Telemetry sync ──────────────────────────────────────────────────
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("sqlx: {0}")]
    Sqlx(String),
}

// ─── Runtime-session backend errors ─────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("session {session_id} probe failed: {message}")]
    Probe {
        session_id: String,
        message: String,
    },

    #[error("restart of agent {agent_id} failed: {message}")]
    Restart { agent_id: String, message: String },

    #[error("runtime backend unavailable: {0}")]
    Backend(String),
}

// ─── Alert dispatch errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("channel {channel} delivery failed: {message}")]
    Delivery { channel: String, message: String },

    #[error("no alert channels enabled")]
    NoChannels,
}

// ─── Telemetry errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("run record {0} not found")]
    RunNotFound(String),

    #[error("snapshot decode failed: {0}")]
    Decode(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = WardenError::Config(ConfigError::Validation("negative cooldown".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn runtime_probe_error_displays_session() {
        let err = WardenError::Runtime(RuntimeError::Probe {
            session_id: "sess-42".into(),
            message: "connect timeout".into(),
        });
        assert!(err.to_string().contains("sess-42"));
        assert!(err.to_string().contains("connect timeout"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let warden_err: WardenError = anyhow_err.into();
        assert!(warden_err.to_string().contains("something went wrong"));
    }

    #[test]
    fn alert_delivery_error_displays_channel() {
        let err = WardenError::Alert(AlertError::Delivery {
            channel: "telegram".into(),
            message: "relay returned 503".into(),
        });
        assert!(err.to_string().contains("telegram"));
        assert!(err.to_string().contains("503"));
    }
}
