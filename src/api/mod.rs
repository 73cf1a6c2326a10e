//! HTTP API Handlers and Routes
//!
//! The REST API layer for Veritas, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Execution (`/api`)
//! - `POST /api/execute` - Run a research workflow to completion
//! - `POST /api/upload` - Upload a data file for analysis
//! - `GET /api/status` - Server status and running sessions
//!
//! ## Sessions (`/api/sessions`)
//! - `GET /api/sessions/{id}` - Session state snapshot
//! - `GET /api/sessions/{id}/events` - Progress event stream (SSE)
//! - `POST /api/sessions/{id}/cancel` - Cancel a running session
//!
//! ## Artifacts (`/api/results`, `/api/download`)
//! - `GET /api/results/{session_id}` - Artifact list for a session
//! - `GET /api/download/{session_id}/{artifact}` - Download one artifact
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # OpenAPI Documentation
//!
//! The assembled OpenAPI document is served at `/api/openapi.json`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use crate::types::{
    ExecuteRequest, ExecuteResponse, ExecutionMetrics, Modality, ServerStatus, SessionResults,
    SessionStatus, Source, StageKind, UploadResponse, WorkflowKind,
};
use utoipa::OpenApi;

/// Aggregated OpenAPI document for every route in this module.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::sessions::execute,
        handlers::sessions::get_session,
        handlers::sessions::cancel_session,
        handlers::sessions::server_status,
        handlers::sessions::health,
        handlers::upload::upload,
        handlers::events::session_events,
        handlers::artifacts::session_results,
        handlers::artifacts::download_artifact,
    ),
    components(schemas(
        ExecuteRequest,
        ExecuteResponse,
        ExecutionMetrics,
        UploadResponse,
        ServerStatus,
        SessionResults,
        WorkflowKind,
        Modality,
        SessionStatus,
        StageKind,
        Source,
    )),
    tags(
        (name = "execution", description = "Workflow execution and server status"),
        (name = "sessions", description = "Session state, events and cancellation"),
        (name = "artifacts", description = "Result listing and artifact download"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
