use super::types::{RecoveryAction, RecoveryDecision, RecoveryPolicy, SuppressReason};
use chrono::{DateTime, Utc};

/// Trailing window for the restart budget. Wall-clock, not sweep-count:
/// sweep cadence varies and must not change how fast the budget refills.
pub const ATTEMPT_WINDOW_SECONDS: i64 = 3600;

/// Decide what to do about one flagged agent. Pure: attempt history and the
/// clock come from the caller, nothing is read or written here.
///
/// Checks run in order — master switch, restart budget, cooldown — and the
/// first hit wins. Budget exhaustion still alerts; cooldown stays quiet and
/// leaves the incident open for the next sweep.
pub fn decide(
    attempt_times: &[DateTime<Utc>],
    policy: &RecoveryPolicy,
    now: DateTime<Utc>,
) -> RecoveryDecision {
    if !policy.enabled {
        return RecoveryDecision {
            action: RecoveryAction::None,
            suppress_reason: Some(SuppressReason::PolicyDisabled),
        };
    }

    if attempts_in_window(attempt_times, now) >= u64::from(policy.max_restarts_per_hour) {
        return RecoveryDecision {
            action: RecoveryAction::AlertOnly,
            suppress_reason: Some(SuppressReason::RestartBudgetExhausted),
        };
    }

    if let Some(last) = attempt_times.iter().max() {
        if (now - *last).num_seconds() < policy.cooldown_seconds {
            return RecoveryDecision {
                action: RecoveryAction::None,
                suppress_reason: Some(SuppressReason::CooldownActive),
            };
        }
    }

    RecoveryDecision {
        action: RecoveryAction::Restart,
        suppress_reason: None,
    }
}

/// Restart attempts inside the trailing budget window.
pub fn attempts_in_window(attempt_times: &[DateTime<Utc>], now: DateTime<Utc>) -> u64 {
    attempt_times
        .iter()
        .filter(|t| (now - **t).num_seconds() < ATTEMPT_WINDOW_SECONDS)
        .count() as u64
}

/// Dedupe rule, independent of the restart decision: alert only when the last
/// alert for the same `(agent, reason)` pair is older than the window.
pub fn should_alert(
    last_alert_at: Option<DateTime<Utc>>,
    dedupe_seconds: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_alert_at {
        None => true,
        Some(sent) => (now - sent).num_seconds() >= dedupe_seconds,
    }
}
