//! Stage Processor interface and the pipeline's stage implementations.
//!
//! Every pipeline step (literature search, data analysis, synthesis,
//! outline, draft, review, citation) implements [`StageProcessor`]:
//! `invoke(context) -> StageOutput`. A processor never mutates shared
//! session state; it returns an output that the orchestrator applies
//! through the session store. Processors must be safe to re-invoke
//! after a transient failure, and any side effects are confined to the
//! session's artifact directory.

pub mod analysis;
pub mod citation;
pub mod draft;
pub mod literature;
pub mod outline;
pub mod review;
pub mod synthesis;

use crate::config::LlmConfig;
use crate::llm::{LlmClient, OpenAiCompatClient};
use crate::types::{AppError, Source, StageKind, WorkflowKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

// ============= Stage errors =============

/// Failure class reported by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageErrorKind {
    /// Worth retrying: timeout, rate limit, connection trouble
    Transient,
    /// Not worth retrying: malformed input, quota exhaustion
    Permanent,
}

/// A controlled stage failure. Stages signal this instead of raising
/// uncontrolled faults.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?} failure in stage: {message}")]
pub struct StageError {
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Classify an application error from a collaborator (LLM client,
    /// filesystem) into the stage failure taxonomy.
    pub fn from_app(err: AppError) -> Self {
        match err {
            AppError::Llm(msg) | AppError::Io(msg) => StageError::transient(msg),
            other => StageError::permanent(other.to_string()),
        }
    }
}

pub type StageResult<T> = std::result::Result<T, StageError>;

// ============= Stage context and outputs =============

/// Strongly-typed accumulation of prior stage contributions. Each field
/// is written by exactly one stage kind and read by the stages that
/// declare a need for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOutputs {
    /// Written by `literature`
    pub literature: Option<LiteratureFindings>,
    /// Written by `analysis`
    pub analysis: Option<String>,
    /// Written by `synthesis`
    pub synthesis: Option<String>,
    /// Written by `outline`
    pub outline: Option<String>,
    /// Written by `draft` (latest iteration)
    pub draft: Option<String>,
    /// Written by `citation`
    pub citations: Option<String>,
}

/// Findings and sources collected by the literature stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureFindings {
    pub findings: String,
    pub sources: Vec<Source>,
}

/// The context handed to a stage invocation: the session identity plus
/// the accumulated state relevant to that stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub session_id: Uuid,
    pub goal: String,
    pub workflow: WorkflowKind,
    /// Writing-style profile for the `domain` workflow
    pub domain_profile: Option<String>,
    pub data_file: Option<PathBuf>,
    /// Session-scoped directory for stage side effects
    pub artifact_dir: PathBuf,
    pub outputs: StageOutputs,
    /// Reviewer feedback from earlier revision attempts, oldest first
    pub revision_feedback: Vec<String>,
}

/// Output of one stage invocation. A closed tagged set; the orchestrator
/// merges each variant into its session-state field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageOutput {
    Literature(LiteratureFindings),
    Analysis { summary: String },
    Synthesis { text: String },
    Outline { text: String },
    Draft { content: String },
    Review { score: u8, feedback: String },
    Citations { text: String },
}

impl StageOutput {
    pub fn kind(&self) -> StageKind {
        match self {
            StageOutput::Literature(_) => StageKind::Literature,
            StageOutput::Analysis { .. } => StageKind::Analysis,
            StageOutput::Synthesis { .. } => StageKind::Synthesis,
            StageOutput::Outline { .. } => StageKind::Outline,
            StageOutput::Draft { .. } => StageKind::Draft,
            StageOutput::Review { .. } => StageKind::Review,
            StageOutput::Citations { .. } => StageKind::Citation,
        }
    }
}

// ============= Processor trait and registry =============

/// Uniform capability contract implemented by every pipeline stage.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    /// The stage variant this processor implements
    fn kind(&self) -> StageKind;

    /// Execute the stage against the accumulated context
    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput>;
}

/// Registry of stage processors keyed by [`StageKind`].
pub struct StageRegistry {
    processors: HashMap<StageKind, Arc<dyn StageProcessor>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    pub fn register(&mut self, processor: Arc<dyn StageProcessor>) {
        self.processors.insert(processor.kind(), processor);
    }

    pub fn get(&self, kind: StageKind) -> Option<Arc<dyn StageProcessor>> {
        self.processors.get(&kind).cloned()
    }

    /// Build the full LLM-backed pipeline, one client per stage so that
    /// each stage can run on its configured model tier.
    pub fn llm_backed(llm: &LlmConfig) -> Self {
        let client = |stage: StageKind| -> Arc<dyn LlmClient> {
            Arc::new(OpenAiCompatClient::new(
                &llm.api_base,
                llm.api_key(),
                llm.model_for(stage),
                llm.temperature,
            ))
        };

        let mut registry = Self::new();
        registry.register(Arc::new(literature::LiteratureScout::new(client(
            StageKind::Literature,
        ))));
        registry.register(Arc::new(analysis::DataAnalyst::new(client(
            StageKind::Analysis,
        ))));
        registry.register(Arc::new(synthesis::Synthesizer::new(client(
            StageKind::Synthesis,
        ))));
        registry.register(Arc::new(outline::OutlinePlanner::new(client(
            StageKind::Outline,
        ))));
        registry.register(Arc::new(draft::AcademicWriter::new(client(StageKind::Draft))));
        registry.register(Arc::new(review::QualityReviewer::new(client(
            StageKind::Review,
        ))));
        registry.register(Arc::new(citation::CitationFormatter::new(client(
            StageKind::Citation,
        ))));
        registry
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
