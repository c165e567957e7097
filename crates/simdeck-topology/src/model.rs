//! Canonical node/link model.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use simdeck_client::wire::{
    LinkSpec, NetworkSpec, NodeSpec, TopologyKind, DEFAULT_LINK_BANDWIDTH, DEFAULT_LINK_LATENCY,
    DEFAULT_QUEUE_SIZE,
};
use tracing::debug;

/// Stable node identifier. Doubles as the node name on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The engine's naming scheme: `Node<k>`.
    pub fn numbered(index: u64) -> Self {
        Self(format!("Node{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numbered_wide(index: u128) -> Self {
        Self(format!("Node{index}"))
    }

    /// The `k` of a `Node<k>` id, if this id follows the scheme.
    fn index(&self) -> Option<u64> {
        self.0.strip_prefix("Node")?.parse().ok()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of a directed link: `<source>-><destination>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn between(source: &NodeId, destination: &NodeId) -> Self {
        Self(format!("{source}->{destination}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A node of the canonical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: NodeId,
    pub label: String,
    pub queue_size: u32,
}

/// A directed link of the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyLink {
    pub source: NodeId,
    pub destination: NodeId,
    pub bandwidth: u32,
    /// Propagation latency in seconds
    pub latency: f64,
}

impl TopologyLink {
    pub fn id(&self) -> LinkId {
        LinkId::between(&self.source, &self.destination)
    }
}

/// Why a link could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "node", rename_all = "snake_case")]
pub enum LinkRejection {
    /// An endpoint is not in the model
    MissingEndpoint(NodeId),
    /// Source and destination are the same node
    SelfLoop,
    /// The same directed link already exists
    Duplicate,
}

/// The authoritative node/link structure used to configure a run.
///
/// Invariant: every link's endpoints are nodes of the model, and no directed
/// link appears twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyModel {
    nodes: Vec<TopologyNode>,
    links: Vec<TopologyLink>,
    /// Next candidate for `Node<k>` ids; only ever grows. Wider than any
    /// parsed index so `k + 1` always fits.
    next_index: u128,
}

impl TopologyModel {
    /// Empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the network the engine generates for `kind` with `count` nodes.
    pub fn preset(kind: TopologyKind, count: u32) -> Self {
        let mut model = Self::new();
        let ids: Vec<NodeId> = (0..count).map(|_| model.add_node(None, DEFAULT_QUEUE_SIZE)).collect();
        let n = ids.len();

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        match kind {
            TopologyKind::Ring => pairs.extend((0..n).map(|i| (i, (i + 1) % n))),
            TopologyKind::Mesh => {
                for i in 0..n {
                    pairs.extend((0..n).filter(|&j| j != i).map(|j| (i, j)));
                }
            }
            TopologyKind::Star => {
                for i in 1..n {
                    pairs.push((0, i));
                    pairs.push((i, 0));
                }
            }
            TopologyKind::Line => {
                for i in 1..n {
                    pairs.push((i - 1, i));
                    pairs.push((i, i - 1));
                }
            }
        }

        for (a, b) in pairs {
            // A single-node ring would link to itself; connect drops it.
            let _ = model.connect(&ids[a], &ids[b], DEFAULT_LINK_BANDWIDTH, DEFAULT_LINK_LATENCY);
        }
        model
    }

    /// Adopt a network reported by the engine. Links with missing endpoints,
    /// self-loops and duplicates are dropped.
    pub fn from_network(spec: &NetworkSpec) -> Self {
        let mut model = Self::new();
        for node in &spec.nodes {
            let id = NodeId::new(node.name.clone());
            if model.contains_node(&id) {
                continue;
            }
            model.next_index = model
                .next_index
                .max(id.index().map_or(0, |k| u128::from(k) + 1));
            model.nodes.push(TopologyNode {
                label: node.name.clone(),
                id,
                queue_size: node.queue_size,
            });
        }

        let mut dropped = 0usize;
        for link in &spec.links {
            let source = NodeId::new(link.source.clone());
            let destination = NodeId::new(link.destination.clone());
            if model.connect(&source, &destination, link.bandwidth, link.latency).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, "dropped unusable links from engine topology");
        }
        model
    }

    /// Payload for `configure_network`.
    pub fn to_network(&self) -> NetworkSpec {
        NetworkSpec {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSpec {
                    name: n.id.to_string(),
                    queue_size: n.queue_size,
                })
                .collect(),
            links: self
                .links
                .iter()
                .map(|l| LinkSpec {
                    source: l.source.to_string(),
                    destination: l.destination.to_string(),
                    bandwidth: l.bandwidth,
                    latency: l.latency,
                })
                .collect(),
        }
    }

    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[TopologyLink] {
        &self.links
    }

    pub fn node(&self, id: &NodeId) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn link(&self, id: &LinkId) -> Option<&TopologyLink> {
        self.links.iter().find(|l| &l.id() == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn contains_link(&self, id: &LinkId) -> bool {
        self.link(id).is_some()
    }

    /// Number of links leaving `id`.
    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.links.iter().filter(|l| &l.source == id).count()
    }

    /// Add a node under a fresh id. Ids are never reused, even after removal.
    pub fn add_node(&mut self, label: Option<String>, queue_size: u32) -> NodeId {
        let id = loop {
            let candidate = NodeId::numbered_wide(self.next_index);
            self.next_index += 1;
            if !self.contains_node(&candidate) {
                break candidate;
            }
        };
        self.nodes.push(TopologyNode {
            label: label.unwrap_or_else(|| id.to_string()),
            id: id.clone(),
            queue_size,
        });
        id
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(TopologyNode, Vec<TopologyLink>)> {
        let pos = self.nodes.iter().position(|n| &n.id == id)?;
        let node = self.nodes.remove(pos);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.links)
            .into_iter()
            .partition(|l| &l.source == id || &l.destination == id);
        self.links = kept;

        Some((node, removed))
    }

    /// Create a directed link between two existing nodes.
    pub fn connect(
        &mut self,
        source: &NodeId,
        destination: &NodeId,
        bandwidth: u32,
        latency: f64,
    ) -> Result<LinkId, LinkRejection> {
        for endpoint in [source, destination] {
            if !self.contains_node(endpoint) {
                return Err(LinkRejection::MissingEndpoint(endpoint.clone()));
            }
        }
        if source == destination {
            return Err(LinkRejection::SelfLoop);
        }
        let id = LinkId::between(source, destination);
        if self.contains_link(&id) {
            return Err(LinkRejection::Duplicate);
        }

        self.links.push(TopologyLink {
            source: source.clone(),
            destination: destination.clone(),
            bandwidth,
            latency,
        });
        Ok(id)
    }

    pub fn remove_link(&mut self, id: &LinkId) -> Option<TopologyLink> {
        let pos = self.links.iter().position(|l| &l.id() == id)?;
        Some(self.links.remove(pos))
    }

    /// Returns false if the node does not exist.
    pub fn set_queue_size(&mut self, id: &NodeId, queue_size: u32) -> bool {
        match self.nodes.iter_mut().find(|n| &n.id == id) {
            Some(node) => {
                node.queue_size = queue_size;
                true
            }
            None => false,
        }
    }

    /// Returns false if the node does not exist.
    pub fn relabel(&mut self, id: &NodeId, label: String) -> bool {
        match self.nodes.iter_mut().find(|n| &n.id == id) {
            Some(node) => {
                node.label = label;
                true
            }
            None => false,
        }
    }

    /// Returns false if the link does not exist.
    pub fn set_link_params(
        &mut self,
        id: &LinkId,
        bandwidth: Option<u32>,
        latency: Option<f64>,
    ) -> bool {
        match self.links.iter_mut().find(|l| &l.id() == id) {
            Some(link) => {
                if let Some(bandwidth) = bandwidth {
                    link.bandwidth = bandwidth;
                }
                if let Some(latency) = latency {
                    link.latency = latency;
                }
                true
            }
            None => false,
        }
    }

    /// Check the model invariant: unique node ids, no dangling or duplicate links.
    pub fn is_consistent(&self) -> bool {
        let mut ids = HashSet::new();
        if !self.nodes.iter().all(|n| ids.insert(&n.id)) {
            return false;
        }
        let mut links = HashSet::new();
        self.links.iter().all(|l| {
            ids.contains(&l.source)
                && ids.contains(&l.destination)
                && l.source != l.destination
                && links.insert(l.id())
        })
    }
}
