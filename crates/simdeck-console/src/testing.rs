//! In-process engine for controller, poller and server tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use simdeck_client::{
    Ack, ControlApi, Error as ClientError, MetricsReport, NetworkSpec, NodeSnapshot,
    Result as ClientResult, SimulationConfig, StatusSnapshot, StopAck,
};

use crate::history::SharedHistory;

/// Engine operations, as recorded by [`ScriptedEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Configure,
    Status,
    Metrics,
    Topology,
}

/// Fake engine with scripted reads and injectable failures.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    calls: Mutex<Vec<Op>>,
    failing: Mutex<HashSet<Op>>,
    statuses: Mutex<VecDeque<StatusSnapshot>>,
    metrics: Mutex<VecDeque<MetricsReport>>,
    topology: Mutex<NetworkSpec>,
    final_metrics: Mutex<Option<MetricsReport>>,
    read_delay: Mutex<Option<Duration>>,
    control_delay: Mutex<Option<Duration>>,
    observed: Mutex<Option<SharedHistory>>,
    history_len_at_start: Mutex<Option<usize>>,
    started_with: Mutex<Option<SimulationConfig>>,
    configured_with: Mutex<Option<NetworkSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    pub fn push_status(&self, status: StatusSnapshot) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_metrics(&self, metrics: MetricsReport) {
        self.metrics.lock().unwrap().push_back(metrics);
    }

    pub fn set_topology(&self, network: NetworkSpec) {
        *self.topology.lock().unwrap() = network;
    }

    pub fn set_final_metrics(&self, metrics: MetricsReport) {
        *self.final_metrics.lock().unwrap() = Some(metrics);
    }

    /// Delay every status/metrics read.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Delay every control call.
    pub fn set_control_delay(&self, delay: Duration) {
        *self.control_delay.lock().unwrap() = Some(delay);
    }

    /// Record the history length seen when start arrives.
    pub fn observe(&self, history: SharedHistory) {
        *self.observed.lock().unwrap() = Some(history);
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    pub fn history_len_at_start(&self) -> Option<usize> {
        *self.history_len_at_start.lock().unwrap()
    }

    pub fn started_with(&self) -> Option<SimulationConfig> {
        self.started_with.lock().unwrap().clone()
    }

    pub fn configured_with(&self) -> Option<NetworkSpec> {
        self.configured_with.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: Op) -> ClientResult<()> {
        self.calls.lock().unwrap().push(op);
        let delay = match op {
            Op::Status | Op::Metrics => *self.read_delay.lock().unwrap(),
            _ => *self.control_delay.lock().unwrap(),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ClientError::Status {
                status: 500,
                body: format!("{op:?} failed"),
            });
        }
        Ok(())
    }

    fn ack() -> Ack {
        Ack {
            status: "ok".to_string(),
        }
    }
}

/// A status listing `names` with `processed` packets each.
pub(crate) fn status_of(names: &[&str], processed: u64) -> StatusSnapshot {
    StatusSnapshot {
        nodes: names
            .iter()
            .map(|name| NodeSnapshot {
                name: name.to_string(),
                queue_length: 0,
                packets_processed: processed,
                packets_dropped: 0,
            })
            .collect(),
    }
}

#[async_trait]
impl ControlApi for ScriptedEngine {
    async fn start(&self, config: &SimulationConfig) -> ClientResult<Ack> {
        let observed = self.observed.lock().unwrap().clone();
        if let Some(history) = observed {
            let len = history.try_read().map(|h| h.len()).ok();
            *self.history_len_at_start.lock().unwrap() = len;
        }
        self.enter(Op::Start).await?;
        *self.started_with.lock().unwrap() = Some(config.clone());
        Ok(Self::ack())
    }

    async fn pause(&self) -> ClientResult<Ack> {
        self.enter(Op::Pause).await?;
        Ok(Self::ack())
    }

    async fn resume(&self) -> ClientResult<Ack> {
        self.enter(Op::Resume).await?;
        Ok(Self::ack())
    }

    async fn stop(&self) -> ClientResult<StopAck> {
        self.enter(Op::Stop).await?;
        Ok(StopAck {
            status: "ok".to_string(),
            metrics: *self.final_metrics.lock().unwrap(),
        })
    }

    async fn reset(&self) -> ClientResult<Ack> {
        self.enter(Op::Reset).await?;
        Ok(Self::ack())
    }

    async fn configure_network(&self, network: &NetworkSpec) -> ClientResult<Ack> {
        self.enter(Op::Configure).await?;
        *self.configured_with.lock().unwrap() = Some(network.clone());
        Ok(Self::ack())
    }

    async fn get_status(&self) -> ClientResult<StatusSnapshot> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.enter(Op::Status).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result?;

        let mut queue = self.statuses.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(next.unwrap_or_else(|| status_of(&["Node0", "Node1"], 0)))
    }

    async fn get_metrics(&self) -> ClientResult<MetricsReport> {
        self.enter(Op::Metrics).await?;

        let mut queue = self.metrics.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(next.unwrap_or_default())
    }

    async fn get_topology(&self) -> ClientResult<NetworkSpec> {
        self.enter(Op::Topology).await?;
        Ok(self.topology.lock().unwrap().clone())
    }
}
