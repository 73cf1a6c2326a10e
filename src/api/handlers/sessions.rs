use crate::{
    orchestrator::SessionRequest,
    session::Session,
    types::{ExecuteRequest, ExecuteResponse, Result, ServerStatus, WorkflowKind},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use std::path::PathBuf;
use uuid::Uuid;

/// Execute a research workflow to completion
#[utoipa::path(
    post,
    path = "/api/execute",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Session reached a terminal state", body = ExecuteResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "execution"
)]
pub async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>> {
    let request = SessionRequest {
        goal: payload.goal,
        workflow: payload.workflow,
        data_file: payload.data_file_path.map(PathBuf::from),
        max_revisions: payload.max_revisions,
        quality_threshold: payload.quality_threshold,
        domain: payload.domain,
    };

    let outcome = state.orchestrator.run_session(request).await?;

    Ok(Json(ExecuteResponse {
        success: outcome.success,
        session_id: outcome.session_id,
        content: outcome.content,
        session_dir: outcome.session_dir,
        artifacts: outcome.artifacts,
        metrics: outcome.metrics,
        error: outcome.error,
    }))
}

/// Snapshot of a session's recorded state
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session snapshot"),
        (status = 404, description = "Unknown session")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>> {
    let snapshot = state.store.snapshot(id).await?;
    Ok(Json(snapshot))
}

/// Cancel a running session
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 404, description = "Unknown session")
    ),
    tag = "sessions"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode> {
    let token = state.store.cancel_token(id)?;
    token.cancel();
    tracing::info!(session_id = %id, "cancellation requested");
    Ok(axum::http::StatusCode::ACCEPTED)
}

/// Server status and running sessions
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "Server status", body = ServerStatus)),
    tag = "execution"
)]
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(ServerStatus {
        is_running: true,
        current_sessions: state.store.running_sessions().await,
        available_workflows: [WorkflowKind::Simple, WorkflowKind::Enhanced, WorkflowKind::Domain]
            .iter()
            .map(|w| w.as_str().to_string())
            .collect(),
    })
}

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Server is healthy")),
    tag = "health"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
