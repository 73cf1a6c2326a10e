//! Shared test fixtures: scripted stage processors and state builders.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use veritas::config::VeritasConfig;
use veritas::stages::{
    LiteratureFindings, StageContext, StageError, StageOutput, StageProcessor, StageRegistry,
    StageResult,
};
use veritas::types::{Source, StageKind};
use veritas::AppState;

/// Canned successful output for a stage kind.
pub fn default_output(kind: StageKind) -> StageOutput {
    match kind {
        StageKind::Literature => StageOutput::Literature(LiteratureFindings {
            findings: "Prior work consistently reports the effect.".to_string(),
            sources: vec![Source {
                title: "A Survey of the Field".to_string(),
                url: Some("https://example.org/survey".to_string()),
                relevance_score: 0.9,
            }],
        }),
        StageKind::Analysis => StageOutput::Analysis {
            summary: "The dataset shows a positive trend.".to_string(),
        },
        StageKind::Synthesis => StageOutput::Synthesis {
            text: "Evidence from both branches points the same way.".to_string(),
        },
        StageKind::Outline => StageOutput::Outline {
            text: "1. Introduction\n2. Methods\n3. Findings\n4. Conclusion".to_string(),
        },
        StageKind::Draft => StageOutput::Draft {
            content: "## Introduction\n\nThis report examines the topic in depth.".to_string(),
        },
        StageKind::Review => StageOutput::Review {
            score: 9,
            feedback: "Well structured and well sourced.".to_string(),
        },
        StageKind::Citation => StageOutput::Citations {
            text: "[1] A Survey of the Field. https://example.org/survey".to_string(),
        },
    }
}

/// A stage processor that replays a script of outcomes, then repeats
/// the canned default success. Records how many times it was invoked.
pub struct ScriptedProcessor {
    kind: StageKind,
    script: Mutex<VecDeque<StageResult<StageOutput>>>,
    invocations: AtomicU32,
    /// One delay consumed per invocation; empty means answer at once
    delays: Mutex<VecDeque<Duration>>,
}

impl ScriptedProcessor {
    fn with_parts(
        kind: StageKind,
        outcomes: Vec<StageResult<StageOutput>>,
        delays: Vec<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(outcomes.into()),
            invocations: AtomicU32::new(0),
            delays: Mutex::new(delays.into()),
        })
    }

    /// Always succeeds with the canned output.
    pub fn ok(kind: StageKind) -> Arc<Self> {
        Self::with_parts(kind, Vec::new(), Vec::new())
    }

    /// Replays the given outcomes in order before falling back to the
    /// canned success.
    pub fn scripted(
        kind: StageKind,
        outcomes: Vec<StageResult<StageOutput>>,
    ) -> Arc<Self> {
        Self::with_parts(kind, outcomes, Vec::new())
    }

    /// Always fails with the given error. A long script of the same
    /// error stands in for "fails forever".
    pub fn failing(kind: StageKind, error: StageError) -> Arc<Self> {
        let outcomes = std::iter::repeat_with(|| Err(error.clone()))
            .take(64)
            .collect();
        Self::scripted(kind, outcomes)
    }

    /// Sleeps before every answer; used to hold a stage in flight.
    pub fn slow(kind: StageKind, delay: Duration) -> Arc<Self> {
        Self::with_parts(kind, Vec::new(), vec![delay; 64])
    }

    /// Sleeps before the first answer only; later invocations answer
    /// at once. Used to trip a stage timeout and then recover.
    pub fn slow_once(kind: StageKind, delay: Duration) -> Arc<Self> {
        Self::with_parts(kind, Vec::new(), vec![delay])
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageProcessor for ScriptedProcessor {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn invoke(&self, _ctx: &StageContext) -> StageResult<StageOutput> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => Ok(default_output(self.kind)),
        }
    }
}

/// An LLM client that records every prompt and answers with a fixed
/// response. Backs real stage processors in tests.
pub struct CannedLlmClient {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl CannedLlmClient {
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl veritas::LlmClient for CannedLlmClient {
    async fn generate(&self, prompt: &str) -> veritas::types::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "canned-model"
    }
}

/// A reviewer that hands out a fixed score sequence, one per draft.
pub fn reviewer_with_scores(scores: &[u8]) -> Arc<ScriptedProcessor> {
    let outcomes = scores
        .iter()
        .map(|&score| {
            Ok(StageOutput::Review {
                score,
                feedback: format!("Needs work, scored {}", score),
            })
        })
        .collect();
    ScriptedProcessor::scripted(StageKind::Review, outcomes)
}

/// Registry with a well-behaved processor for every stage. Individual
/// stages can be overridden by registering over them.
pub fn happy_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    for kind in [
        StageKind::Literature,
        StageKind::Analysis,
        StageKind::Synthesis,
        StageKind::Outline,
        StageKind::Draft,
        StageKind::Review,
        StageKind::Citation,
    ] {
        registry.register(ScriptedProcessor::ok(kind));
    }
    registry
}

/// Application state over a scripted registry, with artifacts routed
/// into a temp directory owned by the caller.
pub fn test_state(registry: StageRegistry, results_dir: &std::path::Path) -> AppState {
    test_state_with_timeout(registry, results_dir, 5)
}

/// Like [`test_state`] but with an explicit stage timeout, for tests
/// that need a stage to run out the clock quickly.
pub fn test_state_with_timeout(
    registry: StageRegistry,
    results_dir: &std::path::Path,
    stage_timeout_secs: u64,
) -> AppState {
    let mut config = VeritasConfig::default();
    config.orchestrator.results_dir = results_dir.to_path_buf();
    config.orchestrator.uploads_dir = results_dir.join("uploads");
    config.orchestrator.stage_timeout_secs = stage_timeout_secs;
    AppState::with_registry(config, Arc::new(registry))
}
