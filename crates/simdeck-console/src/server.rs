//! Axum HTTP surface for the operator console.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use simdeck_client::SimulationConfig;
use simdeck_topology::{EditOutcome, GraphEdit, GraphView, TopologyError};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tower_http::cors::CorsLayer;

use crate::console::{Console, TopologyHandle};
use crate::control::{ControlAction, ControlStatus};
use crate::error::{Error, Result};
use crate::history::{HistorySnapshot, NodeSample, SharedHistory};

/// Shared application state.
///
/// The console mutex is held across control actions; topology reads and
/// edits go through their own handle and never wait on it.
pub struct AppState {
    console: Arc<Mutex<Console>>,
    topology: TopologyHandle,
    status: watch::Receiver<ControlStatus>,
    history: SharedHistory,
}

/// Operator API server.
pub struct ConsoleServer {
    state: Arc<AppState>,
}

impl ConsoleServer {
    pub fn new(console: Console) -> Self {
        let status = console.subscribe();
        let history = console.history();
        let topology = console.topology().clone();
        Self {
            state: Arc::new(AppState {
                console: Arc::new(Mutex::new(console)),
                topology,
                status,
                history,
            }),
        }
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/config", put(config_handler))
            .route("/api/control/{action}", post(control_handler))
            .route("/api/history", get(history_handler))
            .route("/api/history/nodes/{name}", get(node_history_handler))
            .route("/api/topology", get(topology_handler))
            .route("/api/topology/edit", post(edit_handler))
            .route("/api/topology/load", post(load_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the server on the given address.
    pub async fn serve(self, addr: SocketAddr) -> std::result::Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Run the server on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> std::result::Result<(), std::io::Error> {
        tracing::info!("Console API listening on http://{}", listener.local_addr()?);
        let follower = tokio::spawn(
            self.state
                .topology
                .clone()
                .follow_history(self.state.history.clone()),
        );
        let result = axum::serve(listener, self.router()).await;
        follower.abort();
        result
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Busy
            | Error::InvalidTransition { .. }
            | Error::ConfigLocked(_)
            | Error::Topology(TopologyError::EditingLocked) => StatusCode::CONFLICT,
            Error::Topology(_) => StatusCode::BAD_REQUEST,
            Error::Remote(_) => StatusCode::BAD_GATEWAY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Task(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Console status response.
#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    control: ControlStatus,
    can_edit_config: bool,
    ticks: usize,
}

async fn status_response(state: &AppState) -> StatusResponse {
    let control = state.status.borrow().clone();
    let ticks = state.history.read().await.len();
    StatusResponse {
        can_edit_config: control.can_edit_config(),
        control,
        ticks,
    }
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status_response(&state).await)
}

async fn config_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<SimulationConfig>,
) -> Result<Json<SimulationConfig>> {
    let mut console = state.console.try_lock().map_err(|_| Error::Busy)?;
    Ok(Json(console.update_config(config).await?))
}

async fn control_handler(
    State(state): State<Arc<AppState>>,
    Path(action): Path<ControlAction>,
) -> Result<Json<StatusResponse>> {
    let mut console = state.console.clone().try_lock_owned().map_err(|_| Error::Busy)?;
    // Detached so a dropped request cannot abandon a half-settled transition
    tokio::spawn(async move { console.perform(action).await }).await??;
    Ok(Json(status_response(&state).await))
}

async fn history_handler(State(state): State<Arc<AppState>>) -> Json<HistorySnapshot> {
    Json(state.history.read().await.snapshot())
}

async fn node_history_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<NodeSample>>> {
    let history = state.history.read().await;
    match history.node_history(&name) {
        Some(samples) => Ok(Json(samples.to_vec())),
        None => Err(Error::NotFound(format!("node {name}"))),
    }
}

async fn topology_handler(State(state): State<Arc<AppState>>) -> Json<GraphView> {
    Json(state.topology.view().await)
}

async fn edit_handler(
    State(state): State<Arc<AppState>>,
    Json(edit): Json<GraphEdit>,
) -> Result<Json<EditOutcome>> {
    Ok(Json(state.topology.edit(edit).await?))
}

async fn load_handler(State(state): State<Arc<AppState>>) -> Result<Json<GraphView>> {
    let mut console = state.console.try_lock().map_err(|_| Error::Busy)?;
    console.load_engine_topology().await?;
    Ok(Json(state.topology.view().await))
}
