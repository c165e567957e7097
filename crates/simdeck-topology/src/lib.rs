//! SimDeck Topology
//!
//! Canonical node/link model for a simulation run, plus the editor that
//! keeps an interactive graph view in step with it.
//!
//! # Ownership
//!
//! - **Model**: [`TopologyModel`] is authoritative. No link ever references a
//!   node that is not in the model.
//! - **Editor**: [`TopologyEditor`] owns the model and the editor-local state
//!   (positions, selection, activity). All edits go through
//!   [`TopologyEditor::apply`], gated by an [`EditGate`].
//! - **View**: [`GraphView`] is re-derived on demand and never written back.
//! - **Activity**: [`EdgeActivitySignal`] decorates links; it is replaced on
//!   every telemetry refresh and never touches structural link fields.

mod activity;
mod editor;
mod error;
mod model;
mod view;

pub use activity::EdgeActivitySignal;
pub use editor::{EditGate, EditOutcome, GraphEdit, IgnoreReason, ModelOrigin, TopologyEditor};
pub use error::{Result, TopologyError};
pub use model::{LinkId, LinkRejection, NodeId, TopologyLink, TopologyModel, TopologyNode};
pub use view::{GraphView, Position, ViewLink, ViewNode, CANVAS_HEIGHT, CANVAS_WIDTH};
