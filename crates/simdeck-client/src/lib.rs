//! SimDeck engine client
//!
//! Typed wrapper around the network-simulation engine's HTTP API.
//!
//! # Endpoints
//!
//! | Operation | Method/Path |
//! |---|---|
//! | start | `POST /start_simulation` |
//! | pause / resume / stop / reset | `POST /{pause,resume,stop,reset}_simulation` |
//! | configure | `POST /configure_network` |
//! | status / metrics / topology | `GET /get_status`, `/get_metrics`, `/get_topology` |
//!
//! The client holds no state beyond the connection pool. Anything that needs
//! to react to a call's outcome lives in the caller.

mod api;
mod error;
mod http;
pub mod wire;

pub use api::ControlApi;
pub use error::{Error, Result};
pub use http::HttpControlClient;
pub use wire::{
    Ack, LinkSpec, MetricsReport, NetworkSpec, NodeSnapshot, NodeSpec, SimulationConfig,
    StartRequest, StatusSnapshot, StopAck, TopologyKind, TrafficPattern,
};
