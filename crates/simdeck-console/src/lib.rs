//! SimDeck Console
//!
//! Operator console for a remote network-simulation engine.
//!
//! # Architecture
//!
//! - **Control**: [`SimulationController`] moves the run through
//!   Stopped/Running/Paused, only after the engine acknowledges
//! - **History**: [`HistoryAccumulator`] collects one metrics sample and one
//!   snapshot per node on every tick while running
//! - **Poller**: [`PollHandle`] owns the tick task; armed and disarmed by the
//!   controller only
//! - **Topology**: the editor from `simdeck-topology`, gated by the controller
//! - **REST API**: [`ConsoleServer`] exposes all of the above
//!
//! # Usage
//!
//! ```ignore
//! let config = ConsoleConfig::from_env()?;
//! let client = HttpControlClient::new(&config.engine_url, config.request_timeout)?;
//! let console = Console::new(Arc::new(client), config.poll_interval);
//!
//! ConsoleServer::new(console).serve(config.listen_addr).await?;
//! ```

mod activity;
mod config;
mod console;
mod control;
mod error;
mod history;
mod poller;
mod server;

#[cfg(test)]
mod testing;

pub use activity::derive_activity;
pub use config::{ConsoleConfig, DEFAULT_POLL_INTERVAL};
pub use console::{Console, TopologyHandle};
pub use control::{ControlAction, ControlStatus, RunState, SimulationController};
pub use error::{Error, Result};
pub use history::{
    unix_millis, HistoryAccumulator, HistorySnapshot, MetricsSample, NodeSample, SharedHistory,
    TickOutcome, TickTicket, Timestamp,
};
pub use poller::PollHandle;
pub use server::ConsoleServer;
