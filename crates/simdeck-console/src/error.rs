//! Error types for the console.

use thiserror::Error;

use crate::control::{ControlAction, RunState};

/// Result type for console operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating the console.
///
/// None of these are fatal: the console stays usable after any of them.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine call failed; local state was left unchanged
    #[error("Remote error: {0}")]
    Remote(#[from] simdeck_client::Error),

    /// A topology edit was refused
    #[error("Topology error: {0}")]
    Topology(#[from] simdeck_topology::TopologyError),

    /// The action is not defined from the current state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: ControlAction,
        state: RunState,
    },

    /// Configuration only changes while stopped
    #[error("configuration is locked while {0}")]
    ConfigLocked(RunState),

    /// Another control action has not settled yet
    #[error("another control action is in flight")]
    Busy,

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad startup configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A detached control task panicked
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
