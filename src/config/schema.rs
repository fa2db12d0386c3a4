use anyhow::{Context, Result, bail};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub recovery: RecoveryDefaults,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

// ── Database ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override for the sqlite file path (default: <workspace>/warden.db)
    #[serde(default)]
    pub path: Option<String>,
}

// ── Heartbeat ingestion guard ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Minimum spacing between accepted heartbeat emissions per agent.
    /// Zero or negative disables the cadence gate.
    #[serde(default = "default_heartbeat_min_interval")]
    pub min_interval_seconds: i64,
    /// Upper bound of the random delay applied before an emission to
    /// desynchronize correlated bursts across agents.
    #[serde(default)]
    pub jitter_seconds: u64,
    /// Serialize heartbeat processing per agent (at most one in-flight emit).
    #[serde(default = "default_true")]
    pub singleflight_enabled: bool,
}

fn default_heartbeat_min_interval() -> i64 {
    60
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_interval_seconds: default_heartbeat_min_interval(),
            jitter_seconds: 0,
            singleflight_enabled: true,
        }
    }
}

// ── Sweep worker ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between scheduler sweeps in daemon mode
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
        }
    }
}

// ── Runtime-session backend ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base URL of the runtime-session backend. When unset, reachability
    /// probes are skipped (heartbeat-only monitoring) and restarts fail soft.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_runtime_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_runtime_timeout() -> u64 {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_seconds: default_runtime_timeout(),
        }
    }
}

// ── Alert relays ─────────────────────────────────────────────────

/// Relay endpoints for the chat channels. The messaging service behind these
/// URLs owns the actual chat-platform credentials; Warden only posts alert
/// payloads to them. The UI channel needs no endpoint (notification rows).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlertsConfig {
    #[serde(default)]
    pub telegram_webhook_url: Option<String>,
    #[serde(default)]
    pub whatsapp_webhook_url: Option<String>,
}

// ── Org-default recovery policy ──────────────────────────────────

/// Values used when an organization has no `recovery_policies` row.
/// Org rows override these per organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDefaults {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: i64,
    #[serde(default = "default_max_restarts")]
    pub max_restarts_per_hour: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: i64,
    #[serde(default = "default_alert_dedupe")]
    pub alert_dedupe_seconds: i64,
    #[serde(default = "default_true")]
    pub alert_telegram: bool,
    #[serde(default = "default_true")]
    pub alert_whatsapp: bool,
    #[serde(default = "default_true")]
    pub alert_ui: bool,
}

fn default_stale_after() -> i64 {
    900
}

fn default_max_restarts() -> u32 {
    3
}

fn default_cooldown() -> i64 {
    300
}

fn default_alert_dedupe() -> i64 {
    900
}

fn default_true() -> bool {
    true
}

impl Default for RecoveryDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_after_seconds: default_stale_after(),
            max_restarts_per_hour: default_max_restarts(),
            cooldown_seconds: default_cooldown(),
            alert_dedupe_seconds: default_alert_dedupe(),
            alert_telegram: true,
            alert_whatsapp: true,
            alert_ui: true,
        }
    }
}

// ── Telemetry sync target ────────────────────────────────────────

/// Optional run record the daemon folds sweep counters into after each tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

// ── Load / save / validate ───────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let warden_dir = home.join(".warden");
        Self::load_or_init_at(&warden_dir)
    }

    /// Load from an explicit directory (tests and containerized deploys).
    pub fn load_or_init_at(warden_dir: &Path) -> Result<Self> {
        let config_path = warden_dir.join("config.toml");
        let workspace_dir = warden_dir.join("workspace");

        if !warden_dir.exists() {
            fs::create_dir_all(warden_dir).context("Failed to create .warden directory")?;
        }
        if !workspace_dir.exists() {
            fs::create_dir_all(&workspace_dir).context("Failed to create workspace directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            // Set computed paths that are skipped during serialization
            config.config_path = config_path;
            config.workspace_dir = workspace_dir;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                workspace_dir,
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep.interval_seconds == 0 {
            bail!("sweep.interval_seconds must be at least 1");
        }
        if self.runtime.request_timeout_seconds == 0 {
            bail!("runtime.request_timeout_seconds must be at least 1");
        }
        if self.recovery.stale_after_seconds <= 0 {
            bail!("recovery.stale_after_seconds must be positive");
        }
        if self.recovery.cooldown_seconds < 0 {
            bail!("recovery.cooldown_seconds cannot be negative");
        }
        if self.recovery.alert_dedupe_seconds < 0 {
            bail!("recovery.alert_dedupe_seconds cannot be negative");
        }
        if self.recovery.max_restarts_per_hour == 0 {
            bail!("recovery.max_restarts_per_hour must be at least 1");
        }
        Ok(())
    }

    /// Resolved sqlite file path.
    pub fn db_path(&self) -> PathBuf {
        match &self.database.path {
            Some(p) => PathBuf::from(p),
            None => self.workspace_dir.join("warden.db"),
        }
    }
}
