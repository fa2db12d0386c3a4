use crate::config::RecoveryDefaults;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of one detected continuity problem.
///
/// `Detected -> Recovering -> Recovered | Failed | Suppressed`; the last
/// three are terminal. A terminal incident is never reopened; a fresh
/// problem for the same agent gets a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Detected,
    Recovering,
    Recovered,
    Failed,
    Suppressed,
}

impl IncidentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Recovered | Self::Failed | Self::Suppressed)
    }

    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Recovering => "recovering",
            Self::Recovered => "recovered",
            Self::Failed => "failed",
            Self::Suppressed => "suppressed",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "recovering" => Self::Recovering,
            "recovered" => Self::Recovered,
            "failed" => Self::Failed,
            "suppressed" => Self::Suppressed,
            _ => Self::Detected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Restart,
    AlertOnly,
    None,
}

impl RecoveryAction {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::AlertOnly => "alert_only",
            Self::None => "none",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "restart" => Self::Restart,
            "alert_only" => Self::AlertOnly,
            _ => Self::None,
        }
    }
}

/// Why the engine held back a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuppressReason {
    PolicyDisabled,
    RestartBudgetExhausted,
    CooldownActive,
}

/// Engine output: what to do about one flagged agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryDecision {
    pub action: RecoveryAction,
    pub suppress_reason: Option<SuppressReason>,
}

/// Effective recovery policy for one organization. Always fully populated:
/// a missing row yields the configured defaults wholesale, a present row
/// wins wholesale. Callers never see a partial policy.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPolicy {
    pub organization_id: String,
    pub enabled: bool,
    pub stale_after_seconds: i64,
    pub max_restarts_per_hour: u32,
    pub cooldown_seconds: i64,
    pub alert_dedupe_seconds: i64,
    pub alert_telegram: bool,
    pub alert_whatsapp: bool,
    pub alert_ui: bool,
}

impl RecoveryPolicy {
    pub fn from_defaults(organization_id: &str, defaults: &RecoveryDefaults) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            enabled: defaults.enabled,
            stale_after_seconds: defaults.stale_after_seconds,
            max_restarts_per_hour: defaults.max_restarts_per_hour,
            cooldown_seconds: defaults.cooldown_seconds,
            alert_dedupe_seconds: defaults.alert_dedupe_seconds,
            alert_telegram: defaults.alert_telegram,
            alert_whatsapp: defaults.alert_whatsapp,
            alert_ui: defaults.alert_ui,
        }
    }

    pub fn any_alert_channel_enabled(&self) -> bool {
        self.alert_telegram || self.alert_whatsapp || self.alert_ui
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryIncident {
    pub id: String,
    pub organization_id: String,
    pub board_id: Option<String>,
    pub agent_id: Option<String>,
    pub status: IncidentStatus,
    pub reason: String,
    pub action: Option<RecoveryAction>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub recovered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecoveryIncident {
    /// Fresh incident in `detected`, no action decided yet.
    pub fn detect(
        organization_id: &str,
        board_id: &str,
        agent_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            board_id: Some(board_id.to_string()),
            agent_id: Some(agent_id.to_string()),
            status: IncidentStatus::Detected,
            reason: reason.to_string(),
            action: None,
            attempts: 0,
            last_error: None,
            detected_at: now,
            recovered_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Totals for one sweep plus the incidents it touched. Owned by the caller;
/// the scheduler keeps no state between runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResult {
    pub board_count: u64,
    pub incident_count: u64,
    pub alerts_sent: u64,
    pub alerts_suppressed_dedupe: u64,
    pub alerts_skipped_status: u64,
    pub incidents: Vec<RecoveryIncident>,
}

/// Which boards a sweep covers: all of them, or one board for manual runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepScope {
    AllBoards,
    Board(String),
}

/// `run_once` either refuses (schema behind the running code) or completes.
#[derive(Debug)]
pub enum SweepOutcome {
    NotReady,
    Completed(SweepResult),
}
