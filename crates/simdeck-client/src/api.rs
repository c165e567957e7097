//! The control surface of a simulation engine.

use async_trait::async_trait;

use crate::error::Result;
use crate::wire::{Ack, MetricsReport, NetworkSpec, SimulationConfig, StatusSnapshot, StopAck};

/// Request/response operations exposed by a simulation engine.
///
/// Every call is a single exchange: no retries, no caching, no local state.
/// Errors come back exactly as the transport or engine produced them.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Start a run with the given configuration.
    async fn start(&self, config: &SimulationConfig) -> Result<Ack>;

    /// Pause the running simulation.
    async fn pause(&self) -> Result<Ack>;

    /// Resume a paused simulation.
    async fn resume(&self) -> Result<Ack>;

    /// Stop the run. The engine reports final metrics with the ack.
    async fn stop(&self) -> Result<StopAck>;

    /// Reset the engine to a clean state.
    async fn reset(&self) -> Result<Ack>;

    /// Replace the engine's network with an explicit node/link set.
    async fn configure_network(&self, network: &NetworkSpec) -> Result<Ack>;

    /// Read per-node counters.
    async fn get_status(&self) -> Result<StatusSnapshot>;

    /// Read aggregate metrics.
    async fn get_metrics(&self) -> Result<MetricsReport>;

    /// Read the network the engine is currently configured with.
    async fn get_topology(&self) -> Result<NetworkSpec>;
}
