//! Interactive topology editor.
//!
//! The canonical [`TopologyModel`] is the single source of truth. Every
//! visual edit enters through [`TopologyEditor::apply`], which mutates the
//! model first; the visual graph is then re-derived by [`TopologyEditor::view`]
//! from the model plus editor-local state (positions, selection, activity).
//! Nothing flows back from the view into the model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use simdeck_client::wire::{
    NetworkSpec, TopologyKind, DEFAULT_LINK_BANDWIDTH, DEFAULT_LINK_LATENCY, DEFAULT_QUEUE_SIZE,
};
use tracing::debug;

use crate::activity::EdgeActivitySignal;
use crate::error::{Result, TopologyError};
use crate::model::{LinkId, LinkRejection, NodeId, TopologyModel};
use crate::view::{GraphView, Position, ViewLink, ViewNode};

/// Decides whether the topology may currently be edited.
pub trait EditGate {
    fn can_edit_config(&self) -> bool;
}

impl EditGate for bool {
    fn can_edit_config(&self) -> bool {
        *self
    }
}

/// A single operator edit on the visual graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEdit {
    AddNode {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        queue_size: Option<u32>,
        #[serde(default)]
        position: Option<Position>,
    },
    MoveNode {
        id: NodeId,
        position: Position,
    },
    Connect {
        source: NodeId,
        destination: NodeId,
        #[serde(default)]
        bandwidth: Option<u32>,
        #[serde(default)]
        latency: Option<f64>,
    },
    RemoveNode {
        id: NodeId,
    },
    RemoveLink {
        id: LinkId,
    },
    Select {
        #[serde(default)]
        id: Option<NodeId>,
    },
    SetQueueSize {
        id: NodeId,
        queue_size: u32,
    },
    Relabel {
        id: NodeId,
        label: String,
    },
    SetLinkParams {
        id: LinkId,
        #[serde(default)]
        bandwidth: Option<u32>,
        #[serde(default)]
        latency: Option<f64>,
    },
}

impl GraphEdit {
    /// Whether the edit touches the canonical model (as opposed to
    /// editor-local state only).
    fn is_structural(&self) -> bool {
        !matches!(self, GraphEdit::MoveNode { .. } | GraphEdit::Select { .. })
    }
}

/// Why an edit was dropped without changing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    UnknownNode(NodeId),
    UnknownLink(LinkId),
    LinkRejected(LinkRejection),
}

/// Result of an accepted edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    NodeAdded { id: NodeId },
    LinkAdded { id: LinkId },
    Applied,
    Ignored { reason: IgnoreReason },
}

impl EditOutcome {
    fn ignored(reason: IgnoreReason) -> Self {
        debug!(?reason, "topology edit ignored");
        EditOutcome::Ignored { reason }
    }
}

/// Where the current canonical model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ModelOrigin {
    /// Generated from the run config; the engine builds the same network itself
    Preset { kind: TopologyKind, node_count: u32 },
    /// Changed by the operator
    Edited,
    /// Read back from the engine
    Loaded,
}

/// Owns the canonical model and the editor-local state layered over it.
#[derive(Debug, Clone)]
pub struct TopologyEditor {
    model: TopologyModel,
    origin: ModelOrigin,
    positions: HashMap<NodeId, Position>,
    selected: Option<NodeId>,
    activity: EdgeActivitySignal,
}

impl TopologyEditor {
    /// Editor seeded with the engine's preset for `kind`.
    pub fn from_preset(kind: TopologyKind, node_count: u32) -> Self {
        let mut editor = Self {
            model: TopologyModel::new(),
            origin: ModelOrigin::Edited,
            positions: HashMap::new(),
            selected: None,
            activity: EdgeActivitySignal::new(),
        };
        editor.replace_model(
            TopologyModel::preset(kind, node_count),
            ModelOrigin::Preset { kind, node_count },
        );
        editor
    }

    pub fn model(&self) -> &TopologyModel {
        &self.model
    }

    pub fn origin(&self) -> ModelOrigin {
        self.origin
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    pub fn position(&self, id: &NodeId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn activity(&self) -> &EdgeActivitySignal {
        &self.activity
    }

    /// The network to configure before starting a run. `None` when the model
    /// is still the preset the engine derives from the run config.
    pub fn network_for_start(&self) -> Option<NetworkSpec> {
        match self.origin {
            ModelOrigin::Preset { .. } => None,
            ModelOrigin::Edited | ModelOrigin::Loaded => Some(self.model.to_network()),
        }
    }

    /// The single mutation entry point for visual edits.
    pub fn apply(&mut self, gate: &impl EditGate, edit: GraphEdit) -> Result<EditOutcome> {
        if !gate.can_edit_config() {
            return Err(TopologyError::EditingLocked);
        }
        validate(&edit)?;

        let structural = edit.is_structural();
        let outcome = match edit {
            GraphEdit::AddNode { label, queue_size, position } => {
                let slot = self.model.nodes().len();
                let id = self
                    .model
                    .add_node(label, queue_size.unwrap_or(DEFAULT_QUEUE_SIZE));
                let position =
                    position.unwrap_or_else(|| Position::ring_slot(slot, (slot + 1).max(12)));
                self.positions.insert(id.clone(), position);
                EditOutcome::NodeAdded { id }
            }
            GraphEdit::MoveNode { id, position } => {
                if !self.model.contains_node(&id) {
                    return Ok(EditOutcome::ignored(IgnoreReason::UnknownNode(id)));
                }
                self.positions.insert(id, position);
                EditOutcome::Applied
            }
            GraphEdit::Connect { source, destination, bandwidth, latency } => {
                match self.model.connect(
                    &source,
                    &destination,
                    bandwidth.unwrap_or(DEFAULT_LINK_BANDWIDTH),
                    latency.unwrap_or(DEFAULT_LINK_LATENCY),
                ) {
                    Ok(id) => {
                        self.activity.retain_links(|l| l != &id);
                        EditOutcome::LinkAdded { id }
                    }
                    Err(rejection) => {
                        return Ok(EditOutcome::ignored(IgnoreReason::LinkRejected(rejection)))
                    }
                }
            }
            GraphEdit::RemoveNode { id } => match self.model.remove_node(&id) {
                Some((_, removed)) => {
                    self.positions.remove(&id);
                    if self.selected.as_ref() == Some(&id) {
                        self.selected = None;
                    }
                    let removed: Vec<LinkId> = removed.iter().map(|l| l.id()).collect();
                    self.activity.retain_links(|l| !removed.contains(l));
                    EditOutcome::Applied
                }
                None => return Ok(EditOutcome::ignored(IgnoreReason::UnknownNode(id))),
            },
            GraphEdit::RemoveLink { id } => match self.model.remove_link(&id) {
                Some(_) => {
                    self.activity.retain_links(|l| l != &id);
                    EditOutcome::Applied
                }
                None => return Ok(EditOutcome::ignored(IgnoreReason::UnknownLink(id))),
            },
            GraphEdit::Select { id } => {
                if let Some(id) = &id {
                    if !self.model.contains_node(id) {
                        return Ok(EditOutcome::ignored(IgnoreReason::UnknownNode(id.clone())));
                    }
                }
                self.selected = id;
                EditOutcome::Applied
            }
            GraphEdit::SetQueueSize { id, queue_size } => {
                if !self.model.set_queue_size(&id, queue_size) {
                    return Ok(EditOutcome::ignored(IgnoreReason::UnknownNode(id)));
                }
                EditOutcome::Applied
            }
            GraphEdit::Relabel { id, label } => {
                if !self.model.relabel(&id, label) {
                    return Ok(EditOutcome::ignored(IgnoreReason::UnknownNode(id)));
                }
                EditOutcome::Applied
            }
            GraphEdit::SetLinkParams { id, bandwidth, latency } => {
                if !self.model.set_link_params(&id, bandwidth, latency) {
                    return Ok(EditOutcome::ignored(IgnoreReason::UnknownLink(id)));
                }
                EditOutcome::Applied
            }
        };

        if structural {
            self.origin = ModelOrigin::Edited;
        }
        Ok(outcome)
    }

    /// Follow a config change to a new preset. Does nothing once the operator
    /// has edited or loaded a model. Returns whether the model was replaced.
    pub fn reseed(&mut self, gate: &impl EditGate, kind: TopologyKind, node_count: u32) -> Result<bool> {
        if !gate.can_edit_config() {
            return Err(TopologyError::EditingLocked);
        }
        match self.origin {
            ModelOrigin::Preset { kind: k, node_count: n } if k == kind && n == node_count => Ok(false),
            ModelOrigin::Preset { .. } => {
                self.replace_model(
                    TopologyModel::preset(kind, node_count),
                    ModelOrigin::Preset { kind, node_count },
                );
                Ok(true)
            }
            ModelOrigin::Edited | ModelOrigin::Loaded => Ok(false),
        }
    }

    /// Adopt the engine's current network as the canonical model.
    pub fn load(&mut self, gate: &impl EditGate, network: &NetworkSpec) -> Result<()> {
        if !gate.can_edit_config() {
            return Err(TopologyError::EditingLocked);
        }
        self.replace_model(TopologyModel::from_network(network), ModelOrigin::Loaded);
        Ok(())
    }

    /// Merge a fresh activity signal into link decoration.
    ///
    /// The previous signal is discarded. Entries for unknown links are
    /// dropped; structural link fields are never touched. Returns the number
    /// of entries kept.
    pub fn apply_activity(&mut self, mut signal: EdgeActivitySignal) -> usize {
        let model = &self.model;
        signal.retain_links(|id| model.contains_link(id));
        self.activity = signal;
        self.activity.len()
    }

    /// Re-derive the visual graph.
    pub fn view(&self) -> GraphView {
        let count = self.model.nodes().len();
        let nodes = self
            .model
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| ViewNode {
                id: n.id.clone(),
                label: n.label.clone(),
                queue_size: n.queue_size,
                position: self
                    .positions
                    .get(&n.id)
                    .copied()
                    .unwrap_or_else(|| Position::ring_slot(i, count)),
                selected: self.selected.as_ref() == Some(&n.id),
            })
            .collect();

        let links = self
            .model
            .links()
            .iter()
            .map(|l| {
                let id = l.id();
                ViewLink {
                    activity: self.activity.get(&id),
                    id,
                    source: l.source.clone(),
                    destination: l.destination.clone(),
                    bandwidth: l.bandwidth,
                    latency: l.latency,
                }
            })
            .collect();

        GraphView {
            nodes,
            links,
            selected: self.selected.clone(),
        }
    }

    /// Swap in a new model, keeping positions of surviving nodes and laying
    /// out new ones on the ring.
    fn replace_model(&mut self, model: TopologyModel, origin: ModelOrigin) {
        let count = model.nodes().len();
        let mut positions = HashMap::with_capacity(count);
        for (i, node) in model.nodes().iter().enumerate() {
            let position = self
                .positions
                .get(&node.id)
                .copied()
                .unwrap_or_else(|| Position::ring_slot(i, count));
            positions.insert(node.id.clone(), position);
        }

        if let Some(selected) = &self.selected {
            if !model.contains_node(selected) {
                self.selected = None;
            }
        }
        self.activity.retain_links(|id| model.contains_link(id));
        self.positions = positions;
        self.model = model;
        self.origin = origin;
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> TopologyError {
    TopologyError::InvalidParameter {
        field,
        reason: reason.into(),
    }
}

fn check_latency(latency: Option<f64>) -> Result<()> {
    match latency {
        Some(l) if !l.is_finite() || l < 0.0 => Err(invalid("latency", format!("{l} is not a valid delay"))),
        _ => Ok(()),
    }
}

fn check_bandwidth(bandwidth: Option<u32>) -> Result<()> {
    match bandwidth {
        Some(0) => Err(invalid("bandwidth", "must be positive")),
        _ => Ok(()),
    }
}

fn check_queue_size(queue_size: Option<u32>) -> Result<()> {
    match queue_size {
        Some(0) => Err(invalid("queue_size", "must be positive")),
        _ => Ok(()),
    }
}

fn validate(edit: &GraphEdit) -> Result<()> {
    match edit {
        GraphEdit::AddNode { label, queue_size, position } => {
            if label.as_deref().is_some_and(|l| l.trim().is_empty()) {
                return Err(invalid("label", "must not be empty"));
            }
            if position.is_some_and(|p| !p.is_finite()) {
                return Err(invalid("position", "must be finite"));
            }
            check_queue_size(*queue_size)
        }
        GraphEdit::MoveNode { position, .. } if !position.is_finite() => {
            Err(invalid("position", "must be finite"))
        }
        GraphEdit::Connect { bandwidth, latency, .. }
        | GraphEdit::SetLinkParams { bandwidth, latency, .. } => {
            check_bandwidth(*bandwidth)?;
            check_latency(*latency)
        }
        GraphEdit::SetQueueSize { queue_size, .. } => check_queue_size(Some(*queue_size)),
        GraphEdit::Relabel { label, .. } if label.trim().is_empty() => {
            Err(invalid("label", "must not be empty"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn editor() -> TopologyEditor {
        TopologyEditor::from_preset(TopologyKind::Ring, 3)
    }

    fn add(editor: &mut TopologyEditor) -> NodeId {
        match editor
            .apply(&true, GraphEdit::AddNode { label: None, queue_size: None, position: None })
            .unwrap()
        {
            EditOutcome::NodeAdded { id } => id,
            other => panic!("expected NodeAdded, got {other:?}"),
        }
    }

    #[test]
    fn add_node_then_link_then_delete() {
        let mut editor = editor();
        let before_nodes = editor.model().nodes().len();
        let before_links = editor.model().links().len();

        let id = add(&mut editor);
        let outcome = editor
            .apply(
                &true,
                GraphEdit::Connect {
                    source: id.clone(),
                    destination: NodeId::from("Node0"),
                    bandwidth: None,
                    latency: None,
                },
            )
            .unwrap();
        assert!(matches!(outcome, EditOutcome::LinkAdded { .. }));
        assert_eq!(editor.model().nodes().len(), before_nodes + 1);
        assert_eq!(editor.model().links().len(), before_links + 1);

        editor.apply(&true, GraphEdit::RemoveNode { id }).unwrap();
        assert_eq!(editor.model().nodes().len(), before_nodes);
        assert_eq!(editor.model().links().len(), before_links);
        assert!(editor.model().is_consistent());
    }

    #[test]
    fn connect_to_missing_node_is_ignored() {
        let mut editor = editor();
        let outcome = editor
            .apply(
                &true,
                GraphEdit::Connect {
                    source: NodeId::from("Node0"),
                    destination: NodeId::from("Nowhere"),
                    bandwidth: None,
                    latency: None,
                },
            )
            .unwrap();

        assert!(matches!(
            outcome,
            EditOutcome::Ignored { reason: IgnoreReason::LinkRejected(LinkRejection::MissingEndpoint(_)) }
        ));
        assert_eq!(editor.model().links().len(), 3);
        // Ignored edits leave the preset in place.
        assert!(matches!(editor.origin(), ModelOrigin::Preset { .. }));
    }

    #[test]
    fn editing_is_locked_by_gate() {
        let mut editor = editor();
        let err = editor
            .apply(&false, GraphEdit::Select { id: Some(NodeId::from("Node0")) })
            .unwrap_err();
        assert_eq!(err, TopologyError::EditingLocked);
        assert!(editor.selected().is_none());

        assert_eq!(
            editor.reseed(&false, TopologyKind::Mesh, 4),
            Err(TopologyError::EditingLocked)
        );
    }

    #[test]
    fn activity_never_touches_structure() {
        let mut editor = editor();
        let links_before = editor.model().links().to_vec();

        let signal: EdgeActivitySignal = [
            (LinkId::from("Node0->Node1"), 7.0),
            (LinkId::from("Gone->Node1"), 99.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(editor.apply_activity(signal), 1);

        assert_eq!(editor.model().links(), links_before.as_slice());
        let view = editor.view();
        let active = view.links.iter().find(|l| l.id.as_str() == "Node0->Node1").unwrap();
        assert_eq!(active.activity, 7.0);
        let idle = view.links.iter().find(|l| l.id.as_str() == "Node1->Node2").unwrap();
        assert_eq!(idle.activity, 0.0);
        assert!(!idle.is_active());
    }

    #[test]
    fn activity_preserves_local_state() {
        let mut editor = editor();
        let target = Position::new(10.0, 20.0);
        editor
            .apply(&true, GraphEdit::MoveNode { id: NodeId::from("Node1"), position: target })
            .unwrap();
        editor
            .apply(&true, GraphEdit::Select { id: Some(NodeId::from("Node1")) })
            .unwrap();

        editor.apply_activity([(LinkId::from("Node1->Node2"), 3.0)].into_iter().collect());

        assert_eq!(editor.position(&NodeId::from("Node1")), Some(target));
        assert_eq!(editor.selected(), Some(&NodeId::from("Node1")));
        let view = editor.view();
        assert!(view.nodes.iter().any(|n| n.selected && n.position == target));
    }

    #[test]
    fn move_and_select_keep_preset_origin() {
        let mut editor = editor();
        editor
            .apply(&true, GraphEdit::MoveNode { id: NodeId::from("Node0"), position: Position::new(1.0, 1.0) })
            .unwrap();
        assert!(editor.network_for_start().is_none());

        add(&mut editor);
        assert_eq!(editor.origin(), ModelOrigin::Edited);
        assert_eq!(editor.network_for_start().unwrap().nodes.len(), 4);
    }

    #[test]
    fn reseed_follows_config_until_edited() {
        let mut editor = editor();
        let moved = Position::new(5.0, 5.0);
        editor
            .apply(&true, GraphEdit::MoveNode { id: NodeId::from("Node0"), position: moved })
            .unwrap();

        assert!(editor.reseed(&true, TopologyKind::Star, 5).unwrap());
        assert_eq!(editor.model().nodes().len(), 5);
        assert_eq!(editor.model().links().len(), 8);
        assert_eq!(editor.position(&NodeId::from("Node0")), Some(moved));

        add(&mut editor);
        assert!(!editor.reseed(&true, TopologyKind::Ring, 3).unwrap());
        assert_eq!(editor.model().nodes().len(), 6);
    }

    #[test]
    fn removing_selected_node_clears_selection() {
        let mut editor = editor();
        let id = NodeId::from("Node2");
        editor.apply(&true, GraphEdit::Select { id: Some(id.clone()) }).unwrap();
        editor.apply(&true, GraphEdit::RemoveNode { id }).unwrap();
        assert!(editor.selected().is_none());
        assert!(editor.view().selected.is_none());
    }

    #[test]
    fn invalid_parameters_are_errors() {
        let mut editor = editor();
        let err = editor
            .apply(
                &true,
                GraphEdit::SetLinkParams {
                    id: LinkId::from("Node0->Node1"),
                    bandwidth: None,
                    latency: Some(-1.0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidParameter { field: "latency", .. }));

        let err = editor
            .apply(&true, GraphEdit::SetQueueSize { id: NodeId::from("Node0"), queue_size: 0 })
            .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidParameter { field: "queue_size", .. }));
    }

    #[test]
    fn load_replaces_model_and_marks_origin() {
        let mut editor = editor();
        let network = TopologyModel::preset(TopologyKind::Line, 4).to_network();
        editor.load(&true, &network).unwrap();

        assert_eq!(editor.origin(), ModelOrigin::Loaded);
        assert_eq!(editor.model().links().len(), 6);
        assert_eq!(editor.network_for_start(), Some(network));
    }

    #[test]
    fn edits_deserialize_from_tagged_json() {
        let edit: GraphEdit = serde_json::from_str(
            r#"{"type":"connect","source":"Node0","destination":"Node2"}"#,
        )
        .unwrap();
        assert_eq!(
            edit,
            GraphEdit::Connect {
                source: NodeId::from("Node0"),
                destination: NodeId::from("Node2"),
                bandwidth: None,
                latency: None,
            }
        );
    }

    fn arb_edit() -> impl Strategy<Value = GraphEdit> {
        let node = (0u64..8).prop_map(NodeId::numbered);
        prop_oneof![
            Just(GraphEdit::AddNode { label: None, queue_size: None, position: None }),
            (node.clone(), node.clone()).prop_map(|(source, destination)| GraphEdit::Connect {
                source,
                destination,
                bandwidth: None,
                latency: None,
            }),
            node.clone().prop_map(|id| GraphEdit::RemoveNode { id }),
            (node.clone(), node.clone())
                .prop_map(|(a, b)| GraphEdit::RemoveLink { id: LinkId::between(&a, &b) }),
            node.prop_map(|id| GraphEdit::Select { id: Some(id) }),
        ]
    }

    proptest! {
        #[test]
        fn model_stays_consistent(edits in proptest::collection::vec(arb_edit(), 0..60)) {
            let mut editor = TopologyEditor::from_preset(TopologyKind::Mesh, 3);
            for edit in edits {
                editor.apply(&true, edit).unwrap();
                prop_assert!(editor.model().is_consistent());
                if let Some(selected) = editor.selected() {
                    prop_assert!(editor.model().contains_node(selected));
                }
                let view = editor.view();
                prop_assert_eq!(view.nodes.len(), editor.model().nodes().len());
                prop_assert_eq!(view.links.len(), editor.model().links().len());
            }
        }
    }
}
