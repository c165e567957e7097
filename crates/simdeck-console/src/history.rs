//! Time series of engine telemetry for the current run.
//!
//! One tick contributes one [`MetricsSample`] and at most one [`NodeSample`]
//! per reported node, all carrying the same timestamp. Ticks take a
//! [`TickTicket`] before fetching; a ticket minted before the last
//! [`HistoryAccumulator::reset_history`] can no longer be applied.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use simdeck_client::{MetricsReport, StatusSnapshot};
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// History shared between the poll task and readers.
pub type SharedHistory = Arc<RwLock<HistoryAccumulator>>;

/// Current wall-clock time.
pub fn unix_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Aggregate metrics at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub timestamp: Timestamp,
    /// Mean latency in seconds
    pub latency: f64,
    /// Packets per second
    pub throughput: f64,
    /// Fraction in [0, 1]
    pub packet_loss: f64,
}

/// One node's counters at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSample {
    pub timestamp: Timestamp,
    pub queue_length: u64,
    pub packets_processed: u64,
    pub packets_dropped: u64,
}

/// Identifies one tick for staleness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    generation: u64,
    seq: u64,
}

/// What happened to a tick's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied { timestamp: Timestamp },
    Stale,
}

/// Serializable copy of the accumulated history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub metrics: Vec<MetricsSample>,
    pub nodes: BTreeMap<String, Vec<NodeSample>>,
    pub latest_status: Option<StatusSnapshot>,
}

/// Append-only metrics and per-node history, truncated only by
/// [`reset_history`](Self::reset_history).
#[derive(Debug)]
pub struct HistoryAccumulator {
    metrics: Vec<MetricsSample>,
    nodes: BTreeMap<String, Vec<NodeSample>>,
    latest_status: Option<StatusSnapshot>,
    generation: u64,
    next_seq: u64,
    last_applied: Option<u64>,
    last_timestamp: Option<Timestamp>,
    /// Bumped on every applied tick and every reset
    revision: watch::Sender<u64>,
}

impl Default for HistoryAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryAccumulator {
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
            nodes: BTreeMap::new(),
            latest_status: None,
            generation: 0,
            next_seq: 0,
            last_applied: None,
            last_timestamp: None,
            revision: watch::channel(0).0,
        }
    }

    /// A fresh accumulator behind the shared lock.
    pub fn shared() -> SharedHistory {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Take a ticket for a tick that is about to fetch.
    pub fn begin_tick(&mut self) -> TickTicket {
        let ticket = TickTicket {
            generation: self.generation,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        ticket
    }

    /// Append one tick's responses.
    ///
    /// Discarded when a reset happened since `ticket` was taken or a newer
    /// tick was already applied. Timestamps are forced strictly increasing.
    pub fn apply_tick(
        &mut self,
        ticket: TickTicket,
        observed_at: Timestamp,
        status: &StatusSnapshot,
        metrics: &MetricsReport,
    ) -> TickOutcome {
        if ticket.generation != self.generation
            || self.last_applied.is_some_and(|seq| seq >= ticket.seq)
        {
            debug!(?ticket, generation = self.generation, "stale tick discarded");
            return TickOutcome::Stale;
        }

        let timestamp = match self.last_timestamp {
            Some(last) => observed_at.max(last + 1),
            None => observed_at,
        };

        self.metrics.push(MetricsSample {
            timestamp,
            latency: metrics.latency,
            throughput: metrics.throughput,
            packet_loss: metrics.packet_loss,
        });

        for node in &status.nodes {
            self.nodes.entry(node.name.clone()).or_default().push(NodeSample {
                timestamp,
                queue_length: node.queue_length,
                packets_processed: node.packets_processed,
                packets_dropped: node.packets_dropped,
            });
        }

        self.latest_status = Some(status.clone());
        self.last_applied = Some(ticket.seq);
        self.last_timestamp = Some(timestamp);
        self.revision.send_modify(|r| *r += 1);
        TickOutcome::Applied { timestamp }
    }

    /// Drop all samples and invalidate outstanding tickets.
    pub fn reset_history(&mut self) {
        self.metrics.clear();
        self.nodes.clear();
        self.latest_status = None;
        self.last_applied = None;
        self.generation += 1;
        self.revision.send_modify(|r| *r += 1);
    }

    /// Watch for applied ticks and resets.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn metrics(&self) -> &[MetricsSample] {
        &self.metrics
    }

    pub fn nodes(&self) -> &BTreeMap<String, Vec<NodeSample>> {
        &self.nodes
    }

    pub fn node_history(&self, name: &str) -> Option<&[NodeSample]> {
        self.nodes.get(name).map(Vec::as_slice)
    }

    pub fn latest_metrics(&self) -> Option<&MetricsSample> {
        self.metrics.last()
    }

    pub fn latest_status(&self) -> Option<&StatusSnapshot> {
        self.latest_status.as_ref()
    }

    /// Number of applied ticks.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            metrics: self.metrics.clone(),
            nodes: self.nodes.clone(),
            latest_status: self.latest_status.clone(),
        }
    }
}
