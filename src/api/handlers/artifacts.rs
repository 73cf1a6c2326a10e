use crate::{
    types::{Result, SessionResults},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use uuid::Uuid;

/// Artifact list for a recorded session
#[utoipa::path(
    get,
    path = "/api/results/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Artifact list", body = SessionResults),
        (status = 404, description = "Unknown session")
    ),
    tag = "artifacts"
)]
pub async fn session_results(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResults>> {
    let snapshot = state.store.snapshot(session_id).await?;
    let dir = state.artifacts.session_dir(snapshot.workflow, session_id);
    Ok(Json(SessionResults {
        session_id,
        status: snapshot.status,
        session_dir: dir.display().to_string(),
        artifacts: snapshot.artifacts,
    }))
}

/// Download one artifact from a session directory
#[utoipa::path(
    get,
    path = "/api/download/{session_id}/{artifact}",
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("artifact" = String, Path, description = "Artifact file name")
    ),
    responses(
        (status = 200, description = "Artifact content"),
        (status = 400, description = "Invalid artifact name"),
        (status = 404, description = "Unknown session or artifact")
    ),
    tag = "artifacts"
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((session_id, artifact)): Path<(Uuid, String)>,
) -> Result<(HeaderMap, Vec<u8>)> {
    let snapshot = state.store.snapshot(session_id).await?;
    let dir = state.artifacts.session_dir(snapshot.workflow, session_id);
    let bytes = state.artifacts.read(&dir, &artifact).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", artifact))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok((headers, bytes))
}
