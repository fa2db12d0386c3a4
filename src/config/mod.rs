pub mod schema;

pub use schema::{
    AlertsConfig, Config, DatabaseConfig, HeartbeatConfig, RecoveryDefaults, RuntimeConfig,
    SweepConfig, TelemetryConfig,
};
