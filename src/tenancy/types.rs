use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Board {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Agent row as the sweep and probe consume it. Provisioning owns the rest of
/// the agent surface; Warden only reads these fields and writes
/// `last_seen_at`/`status` on heartbeat.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: String,
    pub board_id: String,
    pub organization_id: String,
    pub name: String,
    pub runtime_session_id: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Paused,
    Retired,
}

impl AgentStatus {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Retired => "retired",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("paused") {
            Self::Paused
        } else if value.eq_ignore_ascii_case("retired") {
            Self::Retired
        } else {
            Self::Active
        }
    }
}
