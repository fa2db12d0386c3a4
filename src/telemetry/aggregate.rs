use serde_json::Value;

/// Cumulative metrics document persisted on a run record. Keyed by metric
/// name; counters accumulate, derived gauges are recomputed in place.
pub type MetricsSnapshot = serde_json::Map<String, Value>;

/// One batch of deltas to fold into a snapshot. `None` fields are left out
/// of the merge entirely, so callers only touch the metrics they measured.
#[derive(Debug, Clone, Default)]
pub struct MetricsUpdate {
    pub sweeps: Option<i64>,
    pub boards_swept: Option<i64>,
    pub incidents_flagged: Option<i64>,
    pub alerts_sent: Option<i64>,
    pub alerts_suppressed_dedupe: Option<i64>,
    pub alerts_skipped_status: Option<i64>,
    pub latency_samples_ms: Option<Vec<i64>>,
    pub tool_failures: Option<i64>,
    pub tool_calls: Option<i64>,
    pub gate_blocks: Option<i64>,
    pub gate_checks: Option<i64>,
}

impl MetricsUpdate {
    /// Deltas for one completed sweep.
    pub fn from_sweep(result: &crate::recovery::SweepResult) -> Self {
        Self {
            sweeps: Some(1),
            boards_swept: Some(saturating_i64(result.board_count)),
            incidents_flagged: Some(saturating_i64(result.incident_count)),
            alerts_sent: Some(saturating_i64(result.alerts_sent)),
            alerts_suppressed_dedupe: Some(saturating_i64(result.alerts_suppressed_dedupe)),
            alerts_skipped_status: Some(saturating_i64(result.alerts_skipped_status)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_none()
            && self.boards_swept.is_none()
            && self.incidents_flagged.is_none()
            && self.alerts_sent.is_none()
            && self.alerts_suppressed_dedupe.is_none()
            && self.alerts_skipped_status.is_none()
            && self.latency_samples_ms.is_none()
            && self.tool_failures.is_none()
            && self.tool_calls.is_none()
            && self.gate_blocks.is_none()
            && self.gate_checks.is_none()
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Fold an update into a snapshot. Counters add onto whatever the snapshot
/// already holds (floored at zero, unreadable values counted as zero);
/// derived gauges are replaced when their inputs arrive with this update.
pub fn aggregate(mut snapshot: MetricsSnapshot, update: &MetricsUpdate) -> MetricsSnapshot {
    let counters = [
        ("sweeps_total", update.sweeps),
        ("boards_swept", update.boards_swept),
        ("incidents_flagged", update.incidents_flagged),
        ("alerts_sent", update.alerts_sent),
        ("alerts_suppressed_dedupe", update.alerts_suppressed_dedupe),
        ("alerts_skipped_status", update.alerts_skipped_status),
        ("tool_failures", update.tool_failures),
        ("tool_calls", update.tool_calls),
        ("gate_blocks", update.gate_blocks),
        ("gate_checks", update.gate_checks),
    ];
    for (key, delta) in counters {
        if let Some(delta) = delta {
            bump(&mut snapshot, key, delta);
        }
    }

    if let Some(samples) = &update.latency_samples_ms {
        if let Some(p95) = percentile_95(samples) {
            snapshot.insert("latency_p95_ms".to_string(), Value::from(p95));
        }
    }
    if update.tool_calls.is_some_and(|calls| calls > 0) {
        write_rate(&mut snapshot, "tool_failure_rate", "tool_failures", "tool_calls");
    }
    if update.gate_checks.is_some_and(|checks| checks > 0) {
        write_rate(&mut snapshot, "gate_block_rate", "gate_blocks", "gate_checks");
    }

    snapshot
}

/// Nearest-rank 95th percentile: rank `ceil(0.95 * n)` (1-indexed, clamped
/// to the sample count) of the ascending-sorted samples. `None` when empty.
pub fn percentile_95(samples: &[i64]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

fn counter_value(snapshot: &MetricsSnapshot, key: &str) -> i64 {
    snapshot.get(key).and_then(Value::as_i64).unwrap_or(0).max(0)
}

fn bump(snapshot: &mut MetricsSnapshot, key: &str, delta: i64) {
    let next = counter_value(snapshot, key).saturating_add(delta).max(0);
    snapshot.insert(key.to_string(), Value::from(next));
}

/// Ratio of two cumulative counters, rounded to four decimal places. Written
/// after the counters themselves have been bumped, so the rate always
/// reflects the running totals.
fn write_rate(snapshot: &mut MetricsSnapshot, rate_key: &str, numerator: &str, denominator: &str) {
    let total = counter_value(snapshot, denominator);
    if total <= 0 {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = counter_value(snapshot, numerator) as f64 / total as f64;
    let rounded = (raw * 10_000.0).round() / 10_000.0;
    snapshot.insert(rate_key.to_string(), Value::from(rounded));
}
