//! # Veritas - Research Report Orchestration Server
//!
//! A multi-stage research report production server built in Rust, with
//! quality-gated revision, concurrent branch pipelines, durable session
//! state, and live progress streaming.
//!
//! ## Overview
//!
//! Veritas can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `veritas-server` binary
//! 2. **As a library** - Drive the orchestrator from your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use veritas::{
//!     config::VeritasConfig,
//!     orchestrator::SessionRequest,
//!     types::WorkflowKind,
//!     AppState,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VeritasConfig::load(None)?;
//!     let state = AppState::from_config(config);
//!
//!     let outcome = state
//!         .orchestrator
//!         .run_session(SessionRequest {
//!             goal: "Impact of remote work on software team productivity".to_string(),
//!             workflow: WorkflowKind::Enhanced,
//!             data_file: None,
//!             max_revisions: None,
//!             quality_threshold: None,
//!             domain: None,
//!         })
//!         .await?;
//!
//!     println!("{}", outcome.content.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`artifacts`] - Session-scoped artifact storage
//! - [`config`] - TOML configuration with env overrides
//! - [`events`] - Progress event emitter and subscriptions
//! - [`llm`] - OpenAI-compatible LLM client
//! - [`orchestrator`] - Session driver and revision loop
//! - [`plan`] - Modality classification and execution planning
//! - [`session`] - Session state store
//! - [`stages`] - Stage processors (literature through citation)
//! - [`types`] - Common types and error handling
//!
//! ## Architecture
//!
//! One session runs one research workflow end to end: input validation,
//! modality classification, plan execution (with concurrent research
//! branches for hybrid goals), a bounded draft/review revision loop,
//! citation formatting, and finalization. Every state change flows
//! through the session store; every observable step is published as a
//! progress event.

/// HTTP API handlers and routes.
pub mod api;
/// Session-scoped artifact storage.
pub mod artifacts;
/// TOML configuration with environment overrides.
pub mod config;
/// Progress event emitter and subscriptions.
pub mod events;
/// OpenAI-compatible LLM client.
pub mod llm;
/// Session driver, retry policy and revision loop.
pub mod orchestrator;
/// Modality classification and execution planning.
pub mod plan;
/// Session state store.
pub mod session;
/// Stage processor interface and implementations.
pub mod stages;
/// Core types (requests, responses, errors).
pub mod types;

// Re-export commonly used types
pub use artifacts::ArtifactStore;
pub use config::VeritasConfig;
pub use events::{ProgressEmitter, ProgressEvent};
pub use llm::LlmClient;
pub use orchestrator::{Orchestrator, SessionOutcome, SessionRequest};
pub use plan::BranchCoordinator;
pub use session::SessionStore;
pub use stages::{StageProcessor, StageRegistry};
pub use types::{AppError, Result};

use axum::Router;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded infrastructure configuration
    pub config: Arc<VeritasConfig>,
    /// In-memory session state store
    pub store: Arc<SessionStore>,
    /// Progress event channels
    pub emitter: Arc<ProgressEmitter>,
    /// The session driver
    pub orchestrator: Arc<Orchestrator>,
    /// Artifact directory access
    pub artifacts: ArtifactStore,
}

impl AppState {
    /// Build the full application state with LLM-backed stage
    /// processors from configuration.
    pub fn from_config(config: VeritasConfig) -> Self {
        let registry = Arc::new(StageRegistry::llm_backed(&config.llm));
        Self::with_registry(config, registry)
    }

    /// Build application state around a caller-supplied stage registry.
    /// Tests use this to substitute scripted processors.
    pub fn with_registry(config: VeritasConfig, registry: Arc<StageRegistry>) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(SessionStore::new());
        let emitter = Arc::new(ProgressEmitter::new());
        let artifacts = ArtifactStore::new(&config.orchestrator.results_dir);
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            emitter.clone(),
            registry,
            BranchCoordinator::default(),
            artifacts.clone(),
            config.orchestrator.clone(),
        ));
        Self {
            config,
            store,
            emitter,
            orchestrator,
            artifacts,
        }
    }
}

/// Build the application router with all API routes nested under `/api`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::routes::create_router())
        .with_state(state)
}
