//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AddOptionRequest, AddStepRequest, AddStepResponse, ClickRequest, CreateSessionResponse,
    ErrorResponse, FlowResponse, IssuesResponse, MetricsSummary, QueuedResponse, SuccessResponse,
    TextRequest,
};
use super::AppState;
use crate::backend::{LoadError, SaveError};
use crate::flow::{default_flow, editor, validate, EditError, Graph};
use crate::metrics::{top_interests, total_interactions};
use crate::runtime::{FlowStore, MetricsSink, SessionCommand, SessionError, SessionSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        // Session commands
        .route("/api/sessions/:id/click", post(click_option))
        .route("/api/sessions/:id/send", post(send_text))
        .route("/api/sessions/:id/type", post(type_text))
        .route("/api/sessions/:id/reload", post(reload_flow))
        // Flow administration
        .route("/api/flow", get(get_flow).put(replace_flow))
        .route("/api/flow/issues", get(flow_issues))
        .route("/api/flow/reset", post(reset_flow))
        .route("/api/flow/steps", post(add_step))
        .route("/api/flow/steps/:step", delete(remove_step))
        .route("/api/flow/steps/:step/text", put(set_step_text))
        .route("/api/flow/steps/:step/options", post(add_option))
        .route("/api/flow/steps/:step/options/:index", delete(remove_option))
        // Metrics
        .route("/api/metrics/summary", get(metrics_summary))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session_id = state.sessions.create().await;
    Json(CreateSessionResponse { session_id })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.snapshot(&id).await?))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (snapshot, rx) = state.sessions.subscribe(&id).await?;
    Ok(sse_stream(snapshot, rx))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Session Commands
// ============================================================

async fn queue(
    state: &AppState,
    id: &str,
    command: SessionCommand,
) -> Result<Json<QueuedResponse>, AppError> {
    state.sessions.send(id, command).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn click_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, SessionCommand::Click { option: req.option }).await
}

async fn send_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, SessionCommand::Send { text: req.text }).await
}

async fn type_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, SessionCommand::Type { text: req.text }).await
}

async fn reload_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, SessionCommand::Reload).await
}

// ============================================================
// Flow Administration
// ============================================================

async fn load_flow(state: &AppState) -> Result<Graph, AppError> {
    Ok(state.sessions.collaborators().store.load().await?)
}

async fn save_flow(state: &AppState, graph: Graph) -> Result<Json<FlowResponse>, AppError> {
    let issues = validate(&graph);
    if let Some(blocking) = issues.iter().find(|issue| issue.is_blocking()) {
        return Err(AppError::BadRequest(format!(
            "Flow cannot be saved: {blocking:?}"
        )));
    }
    state.sessions.collaborators().store.save(&graph).await?;
    tracing::info!(steps = graph.len(), issues = issues.len(), "Flow saved");
    Ok(Json(FlowResponse {
        flow: graph,
        issues,
    }))
}

/// Load the stored flow, apply one edit and save the result
async fn edit_flow<T>(
    state: &AppState,
    edit: impl FnOnce(&mut Graph) -> Result<T, EditError>,
) -> Result<(T, Json<FlowResponse>), AppError> {
    let mut graph = load_flow(state).await?;
    let value = edit(&mut graph)?;
    let response = save_flow(state, graph).await?;
    Ok((value, response))
}

async fn get_flow(State(state): State<AppState>) -> Result<Json<Graph>, AppError> {
    Ok(Json(load_flow(&state).await?))
}

async fn replace_flow(
    State(state): State<AppState>,
    Json(graph): Json<Graph>,
) -> Result<Json<FlowResponse>, AppError> {
    save_flow(&state, graph).await
}

async fn flow_issues(State(state): State<AppState>) -> Result<Json<IssuesResponse>, AppError> {
    let graph = load_flow(&state).await?;
    Ok(Json(IssuesResponse {
        issues: validate(&graph),
    }))
}

async fn reset_flow(State(state): State<AppState>) -> Result<Json<FlowResponse>, AppError> {
    tracing::info!("Resetting flow to factory default");
    save_flow(&state, default_flow()).await
}

async fn add_step(
    State(state): State<AppState>,
    Json(req): Json<AddStepRequest>,
) -> Result<Json<AddStepResponse>, AppError> {
    let (id, Json(saved)) = edit_flow(&state, |graph| editor::add_step(graph, &req.id)).await?;
    Ok(Json(AddStepResponse {
        id,
        issues: saved.issues,
    }))
}

async fn remove_step(
    State(state): State<AppState>,
    Path(step): Path<String>,
) -> Result<Json<FlowResponse>, AppError> {
    let (_, response) = edit_flow(&state, |graph| editor::remove_step(graph, &step)).await?;
    Ok(response)
}

async fn set_step_text(
    State(state): State<AppState>,
    Path(step): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<FlowResponse>, AppError> {
    let (_, response) =
        edit_flow(&state, |graph| editor::set_text(graph, &step, req.text)).await?;
    Ok(response)
}

async fn add_option(
    State(state): State<AppState>,
    Path(step): Path<String>,
    Json(req): Json<AddOptionRequest>,
) -> Result<Json<FlowResponse>, AppError> {
    let (_, response) =
        edit_flow(&state, |graph| editor::add_option(graph, &step, req.option)).await?;
    Ok(response)
}

async fn remove_option(
    State(state): State<AppState>,
    Path((step, index)): Path<(String, usize)>,
) -> Result<Json<FlowResponse>, AppError> {
    let (_, response) =
        edit_flow(&state, |graph| editor::remove_option(graph, &step, index)).await?;
    Ok(response)
}

// ============================================================
// Metrics
// ============================================================

async fn metrics_summary(State(state): State<AppState>) -> Result<Json<MetricsSummary>, AppError> {
    let events = state
        .sessions
        .collaborators()
        .metrics
        .history()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    Ok(Json(MetricsSummary {
        total: total_interactions(&events),
        top_interests: top_interests(&events),
    }))
}

async fn get_version() -> &'static str {
    concat!("chatflow ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<LoadError> for AppError {
    fn from(e: LoadError) -> Self {
        AppError::BadGateway(e.to_string())
    }
}

impl From<SaveError> for AppError {
    fn from(e: SaveError) -> Self {
        match e {
            SaveError::Unavailable(_) => AppError::BadGateway(e.to_string()),
            SaveError::Encode(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<EditError> for AppError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::UnknownStep(_) | EditError::UnknownOption { .. } => {
                AppError::NotFound(e.to_string())
            }
            EditError::EmptyId | EditError::DuplicateId(_) | EditError::ProtectedStep(_) => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %message, "Request failed");
        }

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
