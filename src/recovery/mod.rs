//! Policy-driven recovery: incident bookkeeping, the restart/alert decision
//! engine, and the sweep scheduler that ties detection to action.

pub mod engine;
pub mod repository;
pub mod scheduler;
pub mod types;

pub use scheduler::RecoveryScheduler;
pub use types::{
    IncidentStatus, RecoveryAction, RecoveryDecision, RecoveryIncident, RecoveryPolicy,
    SuppressReason, SweepOutcome, SweepResult, SweepScope,
};
