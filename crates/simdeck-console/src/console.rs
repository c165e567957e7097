//! The operator console: controller plus topology editor.
//!
//! The editor sits behind its own lock in a [`TopologyHandle`], gated by the
//! controller's published status rather than by the controller itself. Views
//! and edits therefore never wait on a control action's remote call.

use std::sync::Arc;
use std::time::Duration;

use simdeck_client::{ControlApi, MetricsReport, NetworkSpec, SimulationConfig, TopologyKind};
use simdeck_topology::{EditOutcome, GraphEdit, GraphView, TopologyEditor};
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::activity::derive_activity;
use crate::control::{ControlAction, ControlStatus, SimulationController};
use crate::error::{Error, Result};
use crate::history::{HistoryAccumulator, SharedHistory};

/// Shared access to the topology editor.
#[derive(Clone)]
pub struct TopologyHandle {
    editor: Arc<RwLock<TopologyEditor>>,
    status: watch::Receiver<ControlStatus>,
}

impl TopologyHandle {
    pub fn new(editor: TopologyEditor, status: watch::Receiver<ControlStatus>) -> Self {
        Self {
            editor: Arc::new(RwLock::new(editor)),
            status,
        }
    }

    /// Read access to the editor.
    pub async fn read(&self) -> RwLockReadGuard<'_, TopologyEditor> {
        self.editor.read().await
    }

    // The gate is sampled under the editor's write lock, so an edit either
    // lands before a start reads the network or sees the start pending.
    fn gate(&self) -> ControlStatus {
        self.status.borrow().clone()
    }

    /// Apply one visual edit.
    pub async fn edit(&self, edit: GraphEdit) -> Result<EditOutcome> {
        let mut editor = self.editor.write().await;
        let gate = self.gate();
        Ok(editor.apply(&gate, edit)?)
    }

    /// Follow a config change to a new preset.
    pub async fn reseed(&self, kind: TopologyKind, node_count: u32) -> Result<bool> {
        let mut editor = self.editor.write().await;
        let gate = self.gate();
        Ok(editor.reseed(&gate, kind, node_count)?)
    }

    /// Adopt `network` as the canonical model.
    pub async fn load(&self, network: &NetworkSpec) -> Result<()> {
        let mut editor = self.editor.write().await;
        let gate = self.gate();
        Ok(editor.load(&gate, network)?)
    }

    pub async fn network_for_start(&self) -> Option<NetworkSpec> {
        self.editor.read().await.network_for_start()
    }

    /// Graph view with the last merged activity.
    pub async fn view(&self) -> GraphView {
        self.editor.read().await.view()
    }

    /// Recompute link activity from `history`. Returns the number of links
    /// with an entry.
    pub async fn refresh_activity(&self, history: &SharedHistory) -> usize {
        let signal = {
            let history = history.read().await;
            let editor = self.editor.read().await;
            derive_activity(&history, editor.model())
        };
        self.editor.write().await.apply_activity(signal)
    }

    /// Refresh activity after every applied tick and every reset.
    pub async fn follow_history(self, history: SharedHistory) {
        let mut changes = history.read().await.subscribe();
        loop {
            let links = self.refresh_activity(&history).await;
            debug!(links, "link activity refreshed");
            if changes.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Everything an operator acts on.
pub struct Console {
    controller: SimulationController,
    topology: TopologyHandle,
}

impl Console {
    /// A stopped console with the default config and its preset topology.
    pub fn new(api: Arc<dyn ControlApi>, poll_interval: Duration) -> Self {
        let controller = SimulationController::new(api, HistoryAccumulator::shared(), poll_interval);
        let config = controller.config();
        let editor = TopologyEditor::from_preset(config.topology, config.node_count);
        let topology = TopologyHandle::new(editor, controller.subscribe());
        Self { controller, topology }
    }

    pub fn controller(&self) -> &SimulationController {
        &self.controller
    }

    pub fn topology(&self) -> &TopologyHandle {
        &self.topology
    }

    pub fn history(&self) -> SharedHistory {
        self.controller.history().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlStatus> {
        self.controller.subscribe()
    }

    /// Replace the run config, re-seeding a preset topology to match.
    pub async fn update_config(&mut self, config: SimulationConfig) -> Result<SimulationConfig> {
        let config = self.controller.set_config(config)?.clone();
        if self.topology.reseed(config.topology, config.node_count).await? {
            info!(topology = %config.topology, nodes = config.node_count, "topology re-seeded");
        }
        Ok(config)
    }

    pub async fn edit(&self, edit: GraphEdit) -> Result<EditOutcome> {
        self.topology.edit(edit).await
    }

    /// Replace the editor's model with the engine's current network.
    pub async fn load_engine_topology(&mut self) -> Result<()> {
        if !self.controller.can_edit_config() {
            return Err(Error::ConfigLocked(self.controller.state()));
        }
        let network = self.controller.api().get_topology().await?;
        self.topology.load(&network).await?;
        info!(
            nodes = network.nodes.len(),
            links = network.links.len(),
            "topology loaded from engine"
        );
        Ok(())
    }

    /// Start a run, sending an operator-built topology along when there is one.
    pub async fn start(&mut self) -> Result<()> {
        let topology = self.topology.clone();
        self.controller
            .start_with(async move { topology.network_for_start().await })
            .await
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.controller.pause().await
    }

    pub async fn resume(&mut self) -> Result<()> {
        self.controller.resume().await
    }

    pub async fn stop(&mut self) -> Result<Option<MetricsReport>> {
        self.controller.stop().await
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.controller.reset().await
    }

    pub async fn perform(&mut self, action: ControlAction) -> Result<()> {
        match action {
            ControlAction::Start => self.start().await,
            other => self.controller.perform(other).await,
        }
    }

    pub async fn refresh_activity(&self) -> usize {
        self.topology.refresh_activity(self.controller.history()).await
    }

    pub async fn view(&self) -> GraphView {
        self.topology.view().await
    }
}
