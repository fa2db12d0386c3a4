use chrono::{DateTime, Utc};
use serde::Serialize;

pub const REASON_NEVER_SEEN: &str = "never_seen";
pub const REASON_SESSION_UNREACHABLE: &str = "session_unreachable";
pub const REASON_STALE_HEARTBEAT: &str = "stale_heartbeat";
pub const REASON_HEARTBEAT_FRESH: &str = "heartbeat_fresh";

/// Liveness classification for a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Continuity {
    Alive,
    Stale,
    Unreachable,
}

/// One agent's classification, computed fresh on every probe. Never cached
/// beyond the sweep that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuityReading {
    pub agent_id: String,
    pub agent_name: String,
    pub continuity: Continuity,
    pub reason: &'static str,
    /// Error detail from a failed reachability check, if any. Kept separate
    /// from `reason` so incident dedupe keys stay stable across error texts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_detail: Option<String>,
    pub runtime_session_id: Option<String>,
    pub runtime_reachable: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub heartbeat_age_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContinuityCounts {
    pub alive: usize,
    pub stale: usize,
    pub unreachable: usize,
}

impl ContinuityCounts {
    pub fn tally(&mut self, continuity: Continuity) {
        match continuity {
            Continuity::Alive => self.alive += 1,
            Continuity::Stale => self.stale += 1,
            Continuity::Unreachable => self.unreachable += 1,
        }
    }
}

/// Board-wide continuity view returned to read endpoints. Always a complete
/// payload: a dead runtime backend degrades `runtime_error` instead of
/// failing the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ContinuitySnapshot {
    pub board_id: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
    pub counts: ContinuityCounts,
    pub agents: Vec<ContinuityReading>,
}
