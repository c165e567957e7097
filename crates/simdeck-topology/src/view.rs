//! Derived visual graph.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::model::{LinkId, NodeId};

/// Canvas the default layout is computed for.
pub const CANVAS_WIDTH: f64 = 600.0;
pub const CANVAS_HEIGHT: f64 = 400.0;

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Slot `index` of `slots` evenly spaced on a circle centred on the
    /// canvas, starting at twelve o'clock.
    pub fn ring_slot(index: usize, slots: usize) -> Self {
        let slots = slots.max(1) as f64;
        let radius = CANVAS_WIDTH.min(CANVAS_HEIGHT) / 3.0;
        let angle = (index as f64 / slots) * 2.0 * PI - PI / 2.0;
        Self {
            x: CANVAS_WIDTH / 2.0 + radius * angle.cos(),
            y: CANVAS_HEIGHT / 2.0 + radius * angle.sin(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A node as drawn on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub id: NodeId,
    pub label: String,
    pub queue_size: u32,
    pub position: Position,
    pub selected: bool,
}

/// A link as drawn on the canvas. `activity` is decoration only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewLink {
    pub id: LinkId,
    pub source: NodeId,
    pub destination: NodeId,
    pub bandwidth: u32,
    pub latency: f64,
    pub activity: f64,
}

impl ViewLink {
    /// Whether packets should be drawn moving along this link.
    pub fn is_active(&self) -> bool {
        self.activity > 0.0
    }
}

/// Projection of the canonical model plus editor-local state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub links: Vec<ViewLink>,
    pub selected: Option<NodeId>,
}
