use crate::config::HeartbeatConfig;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct AgentLane {
    last_emitted: Option<Instant>,
}

/// Per-agent ingestion throttle: at most one in-flight heartbeat per agent
/// (singleflight) plus a cadence gate so rapid-fire heartbeats collapse into
/// one write per `min_interval_seconds`.
///
/// State is process-local. The lane map grows for the process lifetime,
/// bounded by the number of provisioned agents. Running several ingestion
/// processes needs an external coordinator to keep the single-emit guarantee
/// cluster-wide; one guard instance is built at startup and passed to call
/// sites.
pub struct HeartbeatGuard {
    min_interval_seconds: i64,
    jitter_seconds: u64,
    singleflight: bool,
    lanes: Mutex<HashMap<String, Arc<tokio::sync::Mutex<AgentLane>>>>,
}

impl HeartbeatGuard {
    pub fn new(config: &HeartbeatConfig) -> Self {
        Self {
            min_interval_seconds: config.min_interval_seconds,
            jitter_seconds: config.jitter_seconds,
            singleflight: config.singleflight_enabled,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Run `emit` for this agent unless a heartbeat was accepted within the
    /// cadence window, in which case `on_skip` runs instead. With
    /// singleflight enabled the per-agent lock is held across the jitter
    /// sleep and the emit, so a concurrent second caller blocks, then
    /// re-evaluates cadence and (normally) skips.
    pub async fn execute<T, EF, EFut, SF, SFut>(&self, agent_id: &str, emit: EF, on_skip: SF) -> T
    where
        EF: FnOnce() -> EFut,
        EFut: Future<Output = T>,
        SF: FnOnce() -> SFut,
        SFut: Future<Output = T>,
    {
        let lane = self.lane(agent_id);

        if self.singleflight {
            let mut lane = lane.lock().await;
            if self.within_cadence(lane.last_emitted) {
                tracing::debug!("heartbeat from {agent_id} skipped (cadence)");
                return on_skip().await;
            }
            self.jitter_sleep().await;
            let result = emit().await;
            lane.last_emitted = Some(Instant::now());
            result
        } else {
            // Unlocked mode: the check and the write can race for one agent.
            // Acceptable when single-agent concurrency is not expected.
            let last = { lane.lock().await.last_emitted };
            if self.within_cadence(last) {
                tracing::debug!("heartbeat from {agent_id} skipped (cadence)");
                return on_skip().await;
            }
            self.jitter_sleep().await;
            let result = emit().await;
            lane.lock().await.last_emitted = Some(Instant::now());
            result
        }
    }

    fn lane(&self, agent_id: &str) -> Arc<tokio::sync::Mutex<AgentLane>> {
        let mut lanes = self
            .lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            lanes
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(AgentLane { last_emitted: None }))),
        )
    }

    fn within_cadence(&self, last: Option<Instant>) -> bool {
        if self.min_interval_seconds <= 0 {
            return false;
        }
        let min_interval =
            Duration::from_secs(u64::try_from(self.min_interval_seconds).unwrap_or_default());
        match last {
            Some(prev) => prev.elapsed() < min_interval,
            None => false,
        }
    }

    async fn jitter_sleep(&self) {
        if self.jitter_seconds == 0 {
            return;
        }
        let delay_ms = rand::rng().random_range(0..=self.jitter_seconds.saturating_mul(1000));
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}
