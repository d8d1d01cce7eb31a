use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rover_kernel::{OperatorArbiter, SafetyEngine};
use rover_memory::PersistenceBuffer;
use rover_runtime::{CommandOutcome, CommandService, SnapshotCell, StopSignal};
use rover_types::{MoveCommand, SafetyMode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

/// Default TCP port for the cockpit API.
pub const DEFAULT_PORT: u16 = 8080;

/// Operator name used when a request does not carry one.
pub const ANONYMOUS_OPERATOR: &str = "Anonymous";

#[derive(Error, Debug)]
pub enum CockpitError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Handles to every component the endpoints read or drive.
#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<CommandService>,
    pub arbiter: Arc<OperatorArbiter>,
    pub engine: Arc<SafetyEngine>,
    pub buffer: Arc<PersistenceBuffer>,
    pub snapshot: Arc<SnapshotCell>,
}

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

pub struct CockpitServer {
    state: AppState,
    port: u16,
}

impl CockpitServer {
    /// Create a server on the [`DEFAULT_PORT`].
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind on all interfaces and serve until `stop` is raised.
    ///
    /// # Errors
    ///
    /// [`CockpitError::Bind`] if the port is unavailable.
    pub async fn run(self, stop: StopSignal) -> Result<(), CockpitError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CockpitError::Bind { addr, source })?;
        self.serve(listener, stop).await
    }

    /// Serve on an already-bound listener until `stop` is raised.
    pub async fn serve(self, listener: TcpListener, stop: StopSignal) -> Result<(), CockpitError> {
        let local = listener.local_addr()?;
        info!(%local, "cockpit API listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { stop.wait().await })
            .await?;
        info!("cockpit API stopped");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cmd", get(cmd_handler))
        .route("/control", get(control_handler))
        .route("/take_control", post(take_control_handler))
        .route("/release_control", post(release_control_handler))
        .route("/metrics", get(metrics_handler))
        .route("/aspr_status", get(aspr_status_handler))
        .route("/aspr_metrics", get(aspr_metrics_handler))
        .route("/aspr_mode", post(aspr_mode_handler))
        .route("/sensor", get(sensor_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CmdParams {
    #[serde(rename = "move")]
    pub move_: Option<String>,
    pub operator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OperatorParams {
    pub operator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameBody {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeBody {
    pub mode: String,
}

fn operator_or_anonymous(name: Option<String>) -> String {
    name.unwrap_or_else(|| ANONYMOUS_OPERATOR.to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn cmd_handler(State(state): State<AppState>, Query(params): Query<CmdParams>) -> Response {
    let operator = operator_or_anonymous(params.operator);
    // Ownership first: a non-holder learns nothing else about the request.
    if !state.arbiter.status(&operator).has_control {
        return outcome_response(CommandOutcome::NoControl);
    }

    let raw = params.move_.unwrap_or_else(|| MoveCommand::Stop.as_str().to_string());
    let Ok(command) = raw.parse::<MoveCommand>() else {
        return (StatusCode::BAD_REQUEST, format!("INVALID_MOVE: {raw}")).into_response();
    };

    outcome_response(state.commands.submit(&operator, command).await)
}

/// Map a command outcome onto the wire.
pub fn outcome_response(outcome: CommandOutcome) -> Response {
    match outcome {
        CommandOutcome::NoControl => (StatusCode::FORBIDDEN, "NO_CONTROL_RIGHTS").into_response(),
        CommandOutcome::Blocked(reason) => {
            (StatusCode::FORBIDDEN, format!("BLOCKED_BY_ASPR: {reason}")).into_response()
        }
        CommandOutcome::Forwarded(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, reply.body).into_response()
        }
        CommandOutcome::ActuatorFailed(details) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("actuator error: {details}"),
        )
            .into_response(),
    }
}

pub async fn control_handler(
    State(state): State<AppState>,
    Query(params): Query<OperatorParams>,
) -> Response {
    let operator = operator_or_anonymous(params.operator);
    Json(state.arbiter.status(&operator)).into_response()
}

pub async fn take_control_handler(
    State(state): State<AppState>,
    Json(body): Json<NameBody>,
) -> Response {
    let operator = operator_or_anonymous(body.name);
    state.arbiter.take(&operator);
    Json(json!({ "status": "success", "operator": operator })).into_response()
}

pub async fn release_control_handler(
    State(state): State<AppState>,
    Json(body): Json<NameBody>,
) -> Response {
    let operator = operator_or_anonymous(body.name);
    match state.arbiter.release(&operator) {
        Ok(()) => Json(json!({ "status": "released" })).into_response(),
        Err(e) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "status": "error", "message": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    Json(state.buffer.metrics()).into_response()
}

pub async fn aspr_status_handler(State(state): State<AppState>) -> Response {
    Json(state.engine.status()).into_response()
}

pub async fn aspr_metrics_handler(State(state): State<AppState>) -> Response {
    Json(state.engine.metrics()).into_response()
}

pub async fn aspr_mode_handler(State(state): State<AppState>, Json(body): Json<ModeBody>) -> Response {
    match body.mode.parse::<SafetyMode>() {
        Ok(mode) => {
            state.engine.set_mode(mode);
            Json(json!({ "mode": mode })).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn sensor_handler(State(state): State<AppState>) -> Response {
    match state.snapshot.latest() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => Json(json!({ "error": "no_data" })).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
