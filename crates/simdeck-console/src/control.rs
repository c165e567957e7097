//! Run-state machine for the remote simulation.
//!
//! ```text
//!            start                pause
//! Stopped ─────────► Running ─────────► Paused
//!    ▲                  ▲ ◄──────────────┘ │
//!    │                  │     resume       │
//!    └──── stop ────────┴───── stop ───────┘
//!
//! reset: any state ─► Stopped
//! ```
//!
//! Local state moves only after the engine acknowledged the action. The
//! controller is the only caller of [`PollHandle::arm`] and
//! [`PollHandle::disarm`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simdeck_client::{ControlApi, MetricsReport, NetworkSpec, SimulationConfig};
use simdeck_topology::EditGate;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::history::SharedHistory;
use crate::poller::PollHandle;

/// Lifecycle state of the remote run, as last acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl RunState {
    /// Config and topology edits are only allowed while stopped.
    pub fn allows_config_edits(self) -> bool {
        self == RunState::Stopped
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-triggered transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

impl ControlAction {
    pub const ALL: [ControlAction; 5] = [
        ControlAction::Start,
        ControlAction::Pause,
        ControlAction::Resume,
        ControlAction::Stop,
        ControlAction::Reset,
    ];

    /// Whether the action is defined from `state`.
    pub fn allowed_from(self, state: RunState) -> bool {
        match self {
            ControlAction::Start => state == RunState::Stopped,
            ControlAction::Pause => state == RunState::Running,
            ControlAction::Resume => state == RunState::Paused,
            ControlAction::Stop => matches!(state, RunState::Running | RunState::Paused),
            ControlAction::Reset => true,
        }
    }

    /// State after a successful acknowledgement.
    pub fn target(self) -> RunState {
        match self {
            ControlAction::Start | ControlAction::Resume => RunState::Running,
            ControlAction::Pause => RunState::Paused,
            ControlAction::Stop | ControlAction::Reset => RunState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
            ControlAction::Reset => "reset",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published controller status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlStatus {
    pub state: RunState,
    /// Action awaiting its acknowledgement
    pub pending: Option<ControlAction>,
    pub config: SimulationConfig,
    /// Metrics reported by the last successful stop
    pub final_metrics: Option<MetricsReport>,
    pub last_error: Option<String>,
}

impl ControlStatus {
    /// Whether an operator may edit config or topology right now.
    pub fn can_edit_config(&self) -> bool {
        self.pending.is_none() && self.state.allows_config_edits()
    }

    /// Whether `action` may be triggered right now.
    pub fn can_trigger(&self, action: ControlAction) -> bool {
        self.pending.is_none() && action.allowed_from(self.state)
    }
}

/// Drives the remote run through its lifecycle.
pub struct SimulationController {
    api: Arc<dyn ControlApi>,
    state: RunState,
    config: SimulationConfig,
    history: SharedHistory,
    poller: PollHandle,
    final_metrics: Option<MetricsReport>,
    status: watch::Sender<ControlStatus>,
}

impl SimulationController {
    pub fn new(api: Arc<dyn ControlApi>, history: SharedHistory, poll_interval: Duration) -> Self {
        let config = SimulationConfig::default();
        let (status, _) = watch::channel(ControlStatus {
            state: RunState::Stopped,
            pending: None,
            config: config.clone(),
            final_metrics: None,
            last_error: None,
        });
        Self {
            api,
            state: RunState::Stopped,
            config,
            history,
            poller: PollHandle::new(poll_interval),
            final_metrics: None,
            status,
        }
    }

    pub fn api(&self) -> &Arc<dyn ControlApi> {
        &self.api
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// True iff stopped. Gates config and topology edits.
    pub fn can_edit_config(&self) -> bool {
        self.state.allows_config_edits()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the run config. Out-of-range values are clamped.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<&SimulationConfig> {
        if !self.can_edit_config() {
            return Err(Error::ConfigLocked(self.state));
        }
        self.config = config.clamped();
        let config = self.config.clone();
        self.status.send_modify(|s| s.config = config);
        Ok(&self.config)
    }

    pub fn history(&self) -> &SharedHistory {
        &self.history
    }

    pub fn final_metrics(&self) -> Option<&MetricsReport> {
        self.final_metrics.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_armed()
    }

    /// Watch for status changes.
    pub fn subscribe(&self) -> watch::Receiver<ControlStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ControlStatus {
        self.status.borrow().clone()
    }

    /// Start a run.
    ///
    /// History is cleared before anything is sent. With `network`, the engine
    /// is configured with it first.
    pub async fn start(&mut self, network: Option<NetworkSpec>) -> Result<()> {
        self.start_with(async move { network }).await
    }

    /// Start a run whose network is read only once the start is pending, so
    /// no edit can land between reading it and sending it.
    pub async fn start_with<F>(&mut self, network: F) -> Result<()>
    where
        F: Future<Output = Option<NetworkSpec>>,
    {
        self.check(ControlAction::Start)?;
        self.begin(ControlAction::Start);

        self.history.write().await.reset_history();
        self.final_metrics = None;
        self.status.send_modify(|s| s.final_metrics = None);

        let network = network.await;
        let result = self.remote_start(network.as_ref()).await;
        self.settle(ControlAction::Start, result)?;
        self.poller.arm(self.api.clone(), self.history.clone());
        Ok(())
    }

    async fn remote_start(&self, network: Option<&NetworkSpec>) -> simdeck_client::Result<()> {
        if let Some(network) = network {
            self.api.configure_network(network).await?;
            info!(
                nodes = network.nodes.len(),
                links = network.links.len(),
                "custom topology configured"
            );
        }
        self.api.start(&self.config).await?;
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.check(ControlAction::Pause)?;
        self.begin(ControlAction::Pause);
        let result = self.api.pause().await;
        self.settle(ControlAction::Pause, result)?;
        self.poller.disarm();
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<()> {
        self.check(ControlAction::Resume)?;
        self.begin(ControlAction::Resume);
        let result = self.api.resume().await;
        self.settle(ControlAction::Resume, result)?;
        self.poller.arm(self.api.clone(), self.history.clone());
        Ok(())
    }

    /// Stop the run, keeping its history and the engine's final metrics.
    pub async fn stop(&mut self) -> Result<Option<MetricsReport>> {
        self.check(ControlAction::Stop)?;
        self.begin(ControlAction::Stop);
        let result = self.api.stop().await;
        let ack = self.settle(ControlAction::Stop, result)?;
        self.poller.disarm();

        self.final_metrics = ack.metrics;
        self.status.send_modify(|s| s.final_metrics = ack.metrics);
        Ok(ack.metrics)
    }

    /// Return to a clean slate from any state.
    pub async fn reset(&mut self) -> Result<()> {
        self.check(ControlAction::Reset)?;
        self.begin(ControlAction::Reset);
        let result = self.api.reset().await;
        self.settle(ControlAction::Reset, result)?;
        self.poller.disarm();

        self.history.write().await.reset_history();
        self.final_metrics = None;
        self.status.send_modify(|s| s.final_metrics = None);
        Ok(())
    }

    /// Dispatch by action.
    pub async fn perform(&mut self, action: ControlAction) -> Result<()> {
        match action {
            ControlAction::Start => self.start(None).await,
            ControlAction::Pause => self.pause().await,
            ControlAction::Resume => self.resume().await,
            ControlAction::Stop => self.stop().await.map(|_| ()),
            ControlAction::Reset => self.reset().await,
        }
    }

    fn check(&self, action: ControlAction) -> Result<()> {
        if action.allowed_from(self.state) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn begin(&mut self, action: ControlAction) {
        info!(%action, state = %self.state, "control action sent");
        self.status.send_modify(|s| s.pending = Some(action));
    }

    fn settle<T>(&mut self, action: ControlAction, result: simdeck_client::Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                let from = self.state;
                self.state = action.target();
                info!(%action, %from, to = %self.state, "control action acknowledged");
                let state = self.state;
                self.status.send_modify(|s| {
                    s.state = state;
                    s.pending = None;
                    s.last_error = None;
                });
                Ok(value)
            }
            Err(e) => {
                warn!(%action, state = %self.state, error = %e, "control action failed");
                let message = e.to_string();
                self.status.send_modify(|s| {
                    s.pending = None;
                    s.last_error = Some(message);
                });
                Err(e.into())
            }
        }
    }
}

impl EditGate for ControlStatus {
    fn can_edit_config(&self) -> bool {
        ControlStatus::can_edit_config(self)
    }
}
