//! Wire schema for the simulation engine's HTTP API.
//!
//! Everything the engine sends back is decoded into the explicit types below
//! and validated before it reaches any history buffer.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest network the engine accepts.
pub const MIN_NODES: u32 = 2;
/// Largest network the console lets the operator request.
pub const MAX_NODES: u32 = 20;
/// Packet rate bounds (packets per second).
pub const MIN_PACKET_RATE: u32 = 1;
pub const MAX_PACKET_RATE: u32 = 100;
/// Run duration bounds (seconds).
pub const MIN_DURATION_SECS: u32 = 1;
pub const MAX_DURATION_SECS: u32 = 300;

/// Per-node queue capacity used when none is given.
pub const DEFAULT_QUEUE_SIZE: u32 = 50;
/// Link bandwidth used when none is given.
pub const DEFAULT_LINK_BANDWIDTH: u32 = 100;
/// Link propagation latency in seconds used when none is given.
pub const DEFAULT_LINK_LATENCY: f64 = 0.01;

/// Shape of the generated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    /// Each node links to the next, last wraps to first
    Ring,
    /// Every ordered pair of nodes is linked
    Mesh,
    /// Node0 is the hub, linked both ways to every other node
    Star,
    /// Neighbours in index order are linked both ways
    Line,
}

impl TopologyKind {
    /// All kinds, in the order the console lists them.
    pub const ALL: [TopologyKind; 4] = [
        TopologyKind::Ring,
        TopologyKind::Mesh,
        TopologyKind::Star,
        TopologyKind::Line,
    ];

    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyKind::Ring => "ring",
            TopologyKind::Mesh => "mesh",
            TopologyKind::Star => "star",
            TopologyKind::Line => "line",
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the engine generates traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficPattern {
    Constant,
    Poisson,
    Bursty,
}

impl TrafficPattern {
    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficPattern::Constant => "constant",
            TrafficPattern::Poisson => "poisson",
            TrafficPattern::Bursty => "bursty",
        }
    }
}

impl fmt::Display for TrafficPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-facing run configuration.
///
/// Values are clamped into range with [`SimulationConfig::clamped`] before a
/// config is accepted; an out-of-range config is never submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of nodes in a preset topology
    pub node_count: u32,
    /// Preset topology shape
    pub topology: TopologyKind,
    /// Packets generated per node per second
    pub packet_rate: u32,
    /// Arrival process for generated packets
    pub traffic_pattern: TrafficPattern,
    /// Run length in seconds (sent to the engine in milliseconds)
    pub duration_secs: u32,
    /// Pace the engine against wall-clock time
    pub realtime: bool,
    /// Per-packet processing delay in seconds; engine default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_delay: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 5,
            topology: TopologyKind::Ring,
            packet_rate: 10,
            traffic_pattern: TrafficPattern::Constant,
            duration_secs: 30,
            realtime: true,
            processing_delay: None,
        }
    }
}

impl SimulationConfig {
    /// Clamp every bounded field into its accepted range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.node_count = self.node_count.clamp(MIN_NODES, MAX_NODES);
        self.packet_rate = self.packet_rate.clamp(MIN_PACKET_RATE, MAX_PACKET_RATE);
        self.duration_secs = self.duration_secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
        self.processing_delay = self
            .processing_delay
            .filter(|d| d.is_finite())
            .map(|d| d.max(0.0));
        self
    }

    /// Build the `/start_simulation` body for this config.
    pub fn start_request(&self) -> StartRequest {
        StartRequest {
            num_nodes: self.node_count,
            topology_type: self.topology,
            packet_rate: self.packet_rate,
            traffic_pattern: self.traffic_pattern,
            duration: u64::from(self.duration_secs) * 1000,
            realtime: self.realtime,
            processing_delay: self.processing_delay,
        }
    }
}

/// Body of `POST /start_simulation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub num_nodes: u32,
    pub topology_type: TopologyKind,
    pub packet_rate: u32,
    pub traffic_pattern: TrafficPattern,
    /// Milliseconds
    pub duration: u64,
    pub realtime: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_delay: Option<f64>,
}

/// Acknowledgement returned by every control endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub status: String,
}

/// Acknowledgement of `POST /stop_simulation`, which also reports the run's
/// final metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metrics: Option<MetricsReport>,
}

/// Per-node counters reported by `GET /get_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(default)]
    pub queue_length: u64,
    #[serde(default)]
    pub packets_processed: u64,
    #[serde(default, rename = "packet_dropped", alias = "packets_dropped")]
    pub packets_dropped: u64,
}

/// Body of `GET /get_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
}

impl StatusSnapshot {
    /// Reject snapshots whose node names are empty or not unique.
    pub fn validate(self) -> Result<Self> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(Error::InvalidPayload("node with empty name".into()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(Error::InvalidPayload(format!(
                    "node {} reported twice",
                    node.name
                )));
            }
        }
        Ok(self)
    }

    /// Look up one node by name.
    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Body of `GET /get_metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Mean end-to-end latency in seconds
    #[serde(default)]
    pub latency: f64,
    /// Delivered packets per second
    #[serde(default)]
    pub throughput: f64,
    /// Dropped / sent, 0..=1
    #[serde(default)]
    pub packet_loss: f64,
}

impl MetricsReport {
    /// Reject non-finite or negative rates; clamp loss into `[0, 1]`.
    pub fn validate(mut self) -> Result<Self> {
        for (field, value) in [("latency", self.latency), ("throughput", self.throughput)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidPayload(format!("{field} = {value}")));
            }
        }
        if !self.packet_loss.is_finite() {
            return Err(Error::InvalidPayload(format!(
                "packet_loss = {}",
                self.packet_loss
            )));
        }
        self.packet_loss = self.packet_loss.clamp(0.0, 1.0);
        Ok(self)
    }
}

fn default_queue_size() -> u32 {
    DEFAULT_QUEUE_SIZE
}

fn default_bandwidth() -> u32 {
    DEFAULT_LINK_BANDWIDTH
}

fn default_latency() -> f64 {
    DEFAULT_LINK_LATENCY
}

/// One node of a `configure_network` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,
}

/// One directed link of a `configure_network` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub source: String,
    pub destination: String,
    #[serde(default = "default_bandwidth")]
    pub bandwidth: u32,
    /// Seconds
    #[serde(default = "default_latency")]
    pub latency: f64,
}

/// Body of `POST /configure_network` and `GET /get_topology`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}
