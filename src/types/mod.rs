use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============= API Request/Response Types =============

/// Request body for `POST /api/execute`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// Which pipeline variant to run
    pub workflow: WorkflowKind,
    /// The research goal statement
    pub goal: String,
    /// Path to an uploaded data file, as returned by `/api/upload`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file_path: Option<String>,
    /// Override for the configured revision bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_revisions: Option<u32>,
    /// Override for the configured acceptance threshold (1-10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<u8>,
    /// Writing-style profile for the `domain` workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Terminal result of a session run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    pub success: bool,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<String>,
    pub artifacts: Vec<String>,
    pub metrics: ExecutionMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary metrics reported alongside a terminal session result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExecutionMetrics {
    pub word_count: usize,
    pub draft_versions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<u8>,
    pub duration_ms: u64,
}

/// Response body for `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub file_path: String,
    pub filename: String,
    pub size: usize,
}

/// Response body for `GET /api/status`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerStatus {
    pub is_running: bool,
    pub current_sessions: Vec<Uuid>,
    pub available_workflows: Vec<String>,
}

/// Artifact list for a recorded session (`GET /api/results/{session_id}`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResults {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub session_dir: String,
    pub artifacts: Vec<String>,
}

// ============= Session Types =============

/// Pipeline variant selected at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    /// Single draft pass, one review, no revision loop
    Simple,
    /// Full pipeline with the configured revision bound
    Enhanced,
    /// Full pipeline with a domain writing-style profile
    Domain,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Simple => "simple",
            WorkflowKind::Enhanced => "enhanced",
            WorkflowKind::Domain => "domain",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Research modality derived from the goal text and data-file presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Literature,
    Data,
    Hybrid,
}

/// Session lifecycle status. The only reachable transitions are
/// `Pending -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One pipeline stage. A closed set: the orchestrator dispatches by
/// variant through the execution plan, never by name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Literature,
    Analysis,
    Synthesis,
    Outline,
    Draft,
    Review,
    Citation,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Literature => "literature",
            StageKind::Analysis => "analysis",
            StageKind::Synthesis => "synthesis",
            StageKind::Outline => "outline",
            StageKind::Draft => "draft",
            StageKind::Review => "review",
            StageKind::Citation => "citation",
        }
    }

    /// Human-readable phase label used in progress events.
    pub fn phase_label(&self) -> &'static str {
        match self {
            StageKind::Literature => "Literature research",
            StageKind::Analysis => "Data analysis",
            StageKind::Synthesis => "Synthesis of findings",
            StageKind::Outline => "Outline planning",
            StageKind::Draft => "Draft writing",
            StageKind::Review => "Quality review",
            StageKind::Citation => "Citation formatting",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cited source collected by the literature stage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Source {
    pub title: String,
    pub url: Option<String>,
    pub relevance_score: f32,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::Llm(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Io(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_kind_roundtrip() {
        let json = serde_json::to_string(&WorkflowKind::Enhanced).unwrap();
        assert_eq!(json, "\"enhanced\"");
        let back: WorkflowKind = serde_json::from_str("\"domain\"").unwrap();
        assert_eq!(back, WorkflowKind::Domain);
    }

    #[test]
    fn stage_kind_labels() {
        assert_eq!(StageKind::Literature.as_str(), "literature");
        assert_eq!(StageKind::Review.phase_label(), "Quality review");
    }

    #[test]
    fn execute_request_optional_fields() {
        let req: ExecuteRequest = serde_json::from_str(
            r#"{"workflow": "simple", "goal": "Impact of X on Y"}"#,
        )
        .unwrap();
        assert_eq!(req.workflow, WorkflowKind::Simple);
        assert!(req.data_file_path.is_none());
        assert!(req.quality_threshold.is_none());
    }
}
