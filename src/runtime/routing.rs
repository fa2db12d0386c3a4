use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Health tag a runtime worker advertises about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerHealth {
    Healthy,
    Degraded,
    Unknown,
    Unhealthy,
}

impl WorkerHealth {
    fn rank(self) -> u8 {
        match self {
            Self::Healthy => 3,
            Self::Degraded => 2,
            Self::Unknown => 1,
            Self::Unhealthy => 0,
        }
    }
}

/// Restart placement candidate as the backend advertises it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCandidate {
    pub id: String,
    pub health: WorkerHealth,
    pub capable: bool,
    pub load: i64,
}

/// Total placement order: health rank descending, then load ascending, then
/// id for determinism.
pub fn placement_order(a: &WorkerCandidate, b: &WorkerCandidate) -> Ordering {
    b.health
        .rank()
        .cmp(&a.health.rank())
        .then(a.load.cmp(&b.load))
        .then_with(|| a.id.cmp(&b.id))
}

/// Best capable worker to place a restarted session on, if any.
pub fn pick_worker(candidates: &[WorkerCandidate]) -> Option<&WorkerCandidate> {
    candidates
        .iter()
        .filter(|c| c.capable)
        .min_by(|a, b| placement_order(a, b))
}
