//! The top-level session driver.
//!
//! Drives one research session end to end: validate input, classify
//! modality and build the execution plan, run stage groups (concurrently
//! inside a fan-out, always awaiting the join barrier), apply results to
//! session state, run the bounded revision loop, format citations, and
//! finalize. Progress events are emitted in logical pipeline order even
//! when branch stages complete out of order.

pub mod revision;

use crate::artifacts::ArtifactStore;
use crate::config::OrchestratorConfig;
use crate::events::{LogLevel, ProgressEmitter, ProgressEvent};
use crate::plan::{revision_bound_for, BranchCoordinator, ExecutionPlan, StageGroup};
use crate::session::{DraftVersion, SessionStore, StageOutcome, StageRecord};
use crate::stages::{
    StageContext, StageError, StageErrorKind, StageOutput, StageProcessor, StageRegistry,
};
use crate::types::{
    AppError, ExecutionMetrics, Result, SessionStatus, StageKind, WorkflowKind,
};
use chrono::Utc;
use revision::{LoopDecision, RevisionController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A session submission, validated and run by [`Orchestrator::run_session`].
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub goal: String,
    pub workflow: WorkflowKind,
    pub data_file: Option<PathBuf>,
    /// Per-request override of the configured revision bound
    pub max_revisions: Option<u32>,
    /// Per-request override of the configured acceptance threshold
    pub quality_threshold: Option<u8>,
    /// Writing-style profile for the `domain` workflow
    pub domain: Option<String>,
}

/// Terminal outcome of a session run. The caller always gets a
/// definitive `completed`/`failed` answer, never an indefinitely
/// running session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub success: bool,
    pub content: Option<String>,
    pub session_dir: Option<String>,
    pub artifacts: Vec<String>,
    pub metrics: ExecutionMetrics,
    pub error: Option<String>,
}

/// Effective per-session settings after request overrides.
#[derive(Debug, Clone, Copy)]
struct Settings {
    quality_threshold: u8,
    max_revisions: u32,
    stage_retries: u32,
    stage_timeout: Duration,
}

/// Internal failure channel for a running session.
enum RunError {
    /// Unrecoverable failure; the session is marked `failed`
    Fatal(String),
    /// External cancellation propagated to in-flight stages
    Cancelled,
}

impl RunError {
    fn detail(&self) -> String {
        match self {
            RunError::Fatal(msg) => msg.clone(),
            RunError::Cancelled => "Cancelled: session cancelled by external request".to_string(),
        }
    }
}

enum InvokeError {
    Stage { error: StageError, attempts: u32 },
    Cancelled,
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    emitter: Arc<ProgressEmitter>,
    registry: Arc<StageRegistry>,
    coordinator: BranchCoordinator,
    artifacts: ArtifactStore,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        emitter: Arc<ProgressEmitter>,
        registry: Arc<StageRegistry>,
        coordinator: BranchCoordinator,
        artifacts: ArtifactStore,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            emitter,
            registry,
            coordinator,
            artifacts,
            config,
        }
    }

    fn settings_for(&self, req: &SessionRequest) -> Settings {
        let threshold = req
            .quality_threshold
            .unwrap_or(self.config.quality_threshold)
            .clamp(1, 10);
        let configured_bound = req.max_revisions.unwrap_or(self.config.max_revisions);
        Settings {
            quality_threshold: threshold,
            max_revisions: revision_bound_for(req.workflow, configured_bound),
            stage_retries: self.config.stage_retries,
            stage_timeout: Duration::from_secs(self.config.stage_timeout_secs),
        }
    }

    /// Run one session from submission to terminal state.
    ///
    /// Invalid input (empty goal, unresolvable data file) fails fast
    /// with a permanent error before any session is created. All other
    /// failures yield a `failed` session with its history intact.
    pub async fn run_session(&self, req: SessionRequest) -> Result<SessionOutcome> {
        if req.goal.trim().is_empty() {
            return Err(AppError::InvalidInput("goal must not be empty".to_string()));
        }
        if let Some(path) = &req.data_file {
            if tokio::fs::metadata(path).await.is_err() {
                return Err(AppError::InvalidInput(format!(
                    "data file {} is not resolvable",
                    path.display()
                )));
            }
        }

        let started = Instant::now();
        let settings = self.settings_for(&req);
        let session_id =
            self.store
                .create(req.goal.clone(), req.workflow, req.data_file.clone());
        self.emitter.register(session_id);
        let cancel = self.store.cancel_token(session_id)?;

        self.store
            .set_status(session_id, SessionStatus::Running)
            .await?;
        self.log(
            session_id,
            LogLevel::Info,
            format!("Starting {} workflow: {}", req.workflow, req.goal),
        );

        let plan = self
            .coordinator
            .plan(&req.goal, req.data_file.as_deref());
        self.store.set_modality(session_id, plan.modality).await?;
        tracing::info!(
            %session_id,
            modality = ?plan.modality,
            groups = plan.groups.len(),
            fan_out = plan.has_fan_out(),
            "execution plan ready"
        );
        self.log(
            session_id,
            LogLevel::Info,
            format!("Research modality: {:?}", plan.modality),
        );
        self.emitter
            .publish(session_id, ProgressEvent::progress(0, "Plan ready"));

        match self
            .drive(session_id, &req, &plan, settings, &cancel)
            .await
        {
            Ok((content, session_dir, artifacts, final_draft)) => {
                let word_count = content.split_whitespace().count();
                let snapshot = self.store.snapshot(session_id).await?;
                self.emitter.publish(
                    session_id,
                    ProgressEvent::progress(100, "Research completed"),
                );
                self.log(session_id, LogLevel::Success, "Workflow completed successfully");
                self.emitter.close(session_id);

                Ok(SessionOutcome {
                    session_id,
                    success: true,
                    content: Some(content),
                    session_dir: Some(session_dir.display().to_string()),
                    artifacts,
                    metrics: ExecutionMetrics {
                        word_count,
                        draft_versions: snapshot.drafts.len() as u32,
                        final_score: Some(final_draft.score),
                        duration_ms: started.elapsed().as_millis() as u64,
                    },
                    error: None,
                })
            }
            Err(err) => {
                let detail = err.detail();
                tracing::error!(%session_id, detail, "session failed");
                self.store.fail(session_id, detail.clone()).await?;
                self.log(session_id, LogLevel::Error, detail.clone());
                self.emitter.close(session_id);

                let snapshot = self.store.snapshot(session_id).await?;
                Ok(SessionOutcome {
                    session_id,
                    success: false,
                    content: None,
                    session_dir: None,
                    artifacts: Vec::new(),
                    metrics: ExecutionMetrics {
                        word_count: 0,
                        draft_versions: snapshot.drafts.len() as u32,
                        final_score: None,
                        duration_ms: started.elapsed().as_millis() as u64,
                    },
                    error: Some(detail),
                })
            }
        }
    }

    /// Execute the plan groups in order. Returns the final report
    /// content, the session directory, the artifact list and the
    /// selected draft.
    async fn drive(
        &self,
        session_id: Uuid,
        req: &SessionRequest,
        plan: &ExecutionPlan,
        settings: Settings,
        cancel: &CancellationToken,
    ) -> std::result::Result<(String, PathBuf, Vec<String>, DraftVersion), RunError> {
        let session_dir = self
            .artifacts
            .ensure_session_dir(req.workflow, session_id)
            .await
            .map_err(|e| RunError::Fatal(format!("cannot create session directory: {}", e)))?;

        let total_weight = plan.total_weight();
        let mut done_weight = 0u32;
        let mut selected_draft: Option<DraftVersion> = None;

        let mut i = 0;
        while i < plan.groups.len() {
            let group = &plan.groups[i];

            if group.stages[0].kind == StageKind::Draft {
                // The draft/review pair runs under the revision loop
                // controller; the plan lists one invocation of each.
                let review_weight = plan.groups.get(i + 1).map(StageGroup::weight).unwrap_or(0);
                let version = self
                    .revision_phase(session_id, req, &session_dir, settings, cancel)
                    .await?;
                done_weight += group.weight() + review_weight;
                self.progress(
                    session_id,
                    done_weight,
                    total_weight,
                    "Draft finalized".to_string(),
                );
                selected_draft = Some(version);
                i += 2;
                continue;
            }

            if group.is_fan_out() {
                self.run_fan_out(session_id, req, group, &session_dir, settings, cancel)
                    .await?;
                for planned in &group.stages {
                    done_weight += planned.weight;
                    self.progress(
                        session_id,
                        done_weight,
                        total_weight,
                        format!("{} complete", planned.kind.phase_label()),
                    );
                }
            } else {
                let planned = &group.stages[0];
                self.run_single(
                    session_id,
                    req,
                    planned.kind,
                    &session_dir,
                    settings,
                    cancel,
                    selected_draft.as_ref(),
                )
                .await?;
                done_weight += planned.weight;
                self.progress(
                    session_id,
                    done_weight,
                    total_weight,
                    format!("{} complete", planned.kind.phase_label()),
                );
            }
            i += 1;
        }

        let selected = selected_draft
            .ok_or_else(|| RunError::Fatal("plan produced no draft".to_string()))?;

        // Compose and persist the final deliverables
        let snapshot = self
            .store
            .snapshot(session_id)
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))?;
        let mut content = selected.content.clone();
        if let Some(citations) = &snapshot.outputs.citations {
            content.push_str("\n\n## References\n\n");
            content.push_str(citations);
            self.artifacts
                .write_citations(&session_dir, citations)
                .await
                .map_err(|e| RunError::Fatal(e.to_string()))?;
        }
        self.artifacts
            .write_report(&session_dir, &req.goal, req.workflow, session_id, &content)
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))?;

        let artifacts = self
            .artifacts
            .list(&session_dir)
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))?;
        self.store
            .finalize(session_id, content.clone(), artifacts.clone())
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))?;

        Ok((content, session_dir, artifacts, selected))
    }

    /// Run one non-fan-out stage. Any failure here is fatal: a
    /// single-branch research failure has no surviving branch, and
    /// everything after the join barrier has no degradation path.
    #[allow(clippy::too_many_arguments)]
    async fn run_single(
        &self,
        session_id: Uuid,
        req: &SessionRequest,
        kind: StageKind,
        session_dir: &std::path::Path,
        settings: Settings,
        cancel: &CancellationToken,
        selected_draft: Option<&DraftVersion>,
    ) -> std::result::Result<(), RunError> {
        let processor = self.processor(kind)?;
        let mut ctx = self
            .build_context(session_id, req, session_dir, Vec::new())
            .await?;
        // Citation formats the selected draft, which after exhaustion
        // may not be the latest one applied.
        if let Some(version) = selected_draft {
            ctx.outputs.draft = Some(version.content.clone());
        }

        let started_at = Utc::now();
        match invoke_with_retry(processor, ctx, kind, settings, cancel.clone()).await {
            Ok((output, attempts)) => {
                self.apply_record(
                    session_id,
                    StageRecord {
                        stage: kind,
                        attempts,
                        outcome: StageOutcome::Success { output },
                        started_at,
                        finished_at: Utc::now(),
                    },
                )
                .await?;
                self.log(
                    session_id,
                    LogLevel::Success,
                    format!("{} finished", kind.phase_label()),
                );
                Ok(())
            }
            Err(InvokeError::Cancelled) => Err(RunError::Cancelled),
            Err(InvokeError::Stage { error, attempts }) => {
                self.apply_record(
                    session_id,
                    StageRecord {
                        stage: kind,
                        attempts,
                        outcome: StageOutcome::Failure {
                            kind: error.kind,
                            message: error.message.clone(),
                        },
                        started_at,
                        finished_at: Utc::now(),
                    },
                )
                .await?;
                Err(RunError::Fatal(format!(
                    "{} stage failed: {}",
                    kind, error.message
                )))
            }
        }
    }

    /// Run a fan-out group: all member stages concurrently, then the
    /// join barrier. Results are applied to session state in completion
    /// order; events are emitted in plan order after the join. A failed
    /// branch degrades the plan instead of failing the session, as long
    /// as at least one branch survives.
    async fn run_fan_out(
        &self,
        session_id: Uuid,
        req: &SessionRequest,
        group: &StageGroup,
        session_dir: &std::path::Path,
        settings: Settings,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RunError> {
        for planned in &group.stages {
            self.log(
                session_id,
                LogLevel::Info,
                format!("{} started", planned.kind.phase_label()),
            );
        }

        let ctx = self
            .build_context(session_id, req, session_dir, Vec::new())
            .await?;

        let mut set: JoinSet<(
            StageKind,
            chrono::DateTime<Utc>,
            std::result::Result<(StageOutput, u32), InvokeError>,
        )> = JoinSet::new();
        for planned in &group.stages {
            let kind = planned.kind;
            let processor = self.processor(kind)?;
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let started_at = Utc::now();
                let result = invoke_with_retry(processor, ctx, kind, settings, cancel).await;
                (kind, started_at, result)
            });
        }

        let mut failures: Vec<(StageKind, StageError)> = Vec::new();
        let mut successes = 0usize;
        while let Some(joined) = set.join_next().await {
            let (kind, started_at, result) = joined
                .map_err(|e| RunError::Fatal(format!("branch task panicked: {}", e)))?;
            match result {
                Ok((output, attempts)) => {
                    // Applied in completion order; the store serializes
                    // concurrent applies for this session.
                    self.apply_record(
                        session_id,
                        StageRecord {
                            stage: kind,
                            attempts,
                            outcome: StageOutcome::Success { output },
                            started_at,
                            finished_at: Utc::now(),
                        },
                    )
                    .await?;
                    successes += 1;
                }
                Err(InvokeError::Cancelled) => {
                    set.abort_all();
                    return Err(RunError::Cancelled);
                }
                Err(InvokeError::Stage { error, attempts }) => {
                    self.apply_record(
                        session_id,
                        StageRecord {
                            stage: kind,
                            attempts,
                            outcome: StageOutcome::Failure {
                                kind: error.kind,
                                message: error.message.clone(),
                            },
                            started_at,
                            finished_at: Utc::now(),
                        },
                    )
                    .await?;
                    failures.push((kind, error));
                }
            }
        }

        if successes == 0 {
            let detail = failures
                .iter()
                .map(|(kind, e)| format!("{}: {}", kind, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RunError::Fatal(format!(
                "all research branches failed: {}",
                detail
            )));
        }

        // Graceful degradation: the session continues on the surviving
        // branch, with the failure recorded in session state.
        for (kind, error) in &failures {
            let note = format!(
                "{} branch failed ({:?}): {}; continuing with surviving branch",
                kind, error.kind, error.message
            );
            tracing::warn!(%session_id, stage = %kind, "hybrid plan degraded to single branch");
            self.store
                .add_degradation_note(session_id, note.clone())
                .await
                .map_err(|e| RunError::Fatal(e.to_string()))?;
            self.log(session_id, LogLevel::Warning, note);
        }

        // Completion logs in plan order, not completion order
        for planned in &group.stages {
            if failures.iter().all(|(k, _)| *k != planned.kind) {
                self.log(
                    session_id,
                    LogLevel::Success,
                    format!("{} finished", planned.kind.phase_label()),
                );
            }
        }

        Ok(())
    }

    /// The bounded drafting/review loop. Failures here are fatal: this
    /// runs after the join barrier, where no degradation path exists.
    async fn revision_phase(
        &self,
        session_id: Uuid,
        req: &SessionRequest,
        session_dir: &std::path::Path,
        settings: Settings,
        cancel: &CancellationToken,
    ) -> std::result::Result<DraftVersion, RunError> {
        let drafter = self.processor(StageKind::Draft)?;
        let reviewer = self.processor(StageKind::Review)?;
        let mut controller =
            RevisionController::new(settings.quality_threshold, settings.max_revisions);
        let mut feedback_history: Vec<String> = Vec::new();

        loop {
            // Draft
            let ctx = self
                .build_context(session_id, req, session_dir, feedback_history.clone())
                .await?;
            let started_at = Utc::now();
            let (output, attempts) = invoke_with_retry(
                drafter.clone(),
                ctx,
                StageKind::Draft,
                settings,
                cancel.clone(),
            )
            .await
            .map_err(|e| self.stage_failure_fatal(e, StageKind::Draft))?;
            let content = match &output {
                StageOutput::Draft { content } => content.clone(),
                other => {
                    return Err(RunError::Fatal(format!(
                        "draft stage returned {} output",
                        other.kind()
                    )))
                }
            };
            self.apply_record(
                session_id,
                StageRecord {
                    stage: StageKind::Draft,
                    attempts,
                    outcome: StageOutcome::Success { output },
                    started_at,
                    finished_at: Utc::now(),
                },
            )
            .await?;
            controller.on_draft();

            // Review the fresh draft
            let ctx = self
                .build_context(session_id, req, session_dir, feedback_history.clone())
                .await?;
            let started_at = Utc::now();
            let (output, attempts) = invoke_with_retry(
                reviewer.clone(),
                ctx,
                StageKind::Review,
                settings,
                cancel.clone(),
            )
            .await
            .map_err(|e| self.stage_failure_fatal(e, StageKind::Review))?;
            let (score, feedback) = match &output {
                StageOutput::Review { score, feedback } => (*score, feedback.clone()),
                other => {
                    return Err(RunError::Fatal(format!(
                        "review stage returned {} output",
                        other.kind()
                    )))
                }
            };
            self.apply_record(
                session_id,
                StageRecord {
                    stage: StageKind::Review,
                    attempts,
                    outcome: StageOutcome::Success { output },
                    started_at,
                    finished_at: Utc::now(),
                },
            )
            .await?;

            let version = self
                .store
                .append_draft(session_id, content, score, feedback.clone())
                .await
                .map_err(|e| RunError::Fatal(e.to_string()))?;
            self.artifacts
                .write_draft(session_dir, &version)
                .await
                .map_err(|e| RunError::Fatal(e.to_string()))?;
            self.log(
                session_id,
                LogLevel::Info,
                format!("Draft v{} scored {}/10", version.number, score),
            );

            match controller.on_score(score) {
                LoopDecision::Accept => {
                    self.log(
                        session_id,
                        LogLevel::Success,
                        format!("Draft v{} accepted", version.number),
                    );
                    return Ok(version);
                }
                LoopDecision::Revise => {
                    self.log(
                        session_id,
                        LogLevel::Info,
                        format!(
                            "Revising draft (attempt {}/{})",
                            controller.attempts(),
                            settings.max_revisions
                        ),
                    );
                    feedback_history.push(feedback);
                }
                LoopDecision::Exhaust => {
                    let snapshot = self
                        .store
                        .snapshot(session_id)
                        .await
                        .map_err(|e| RunError::Fatal(e.to_string()))?;
                    let best = snapshot
                        .best_draft()
                        .cloned()
                        .ok_or_else(|| RunError::Fatal("no draft to select".to_string()))?;
                    self.log(
                        session_id,
                        LogLevel::Warning,
                        format!(
                            "Revision bound reached; selecting best draft v{} (score {}/10)",
                            best.number, best.score
                        ),
                    );
                    return Ok(best);
                }
            }
        }
    }

    // ============= helpers =============

    fn processor(
        &self,
        kind: StageKind,
    ) -> std::result::Result<Arc<dyn StageProcessor>, RunError> {
        self.registry
            .get(kind)
            .ok_or_else(|| RunError::Fatal(format!("no processor registered for stage {}", kind)))
    }

    async fn build_context(
        &self,
        session_id: Uuid,
        req: &SessionRequest,
        session_dir: &std::path::Path,
        revision_feedback: Vec<String>,
    ) -> std::result::Result<StageContext, RunError> {
        let snapshot = self
            .store
            .snapshot(session_id)
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))?;
        Ok(StageContext {
            session_id,
            goal: snapshot.goal,
            workflow: req.workflow,
            domain_profile: req.domain.clone(),
            data_file: snapshot.data_file,
            artifact_dir: session_dir.to_path_buf(),
            outputs: snapshot.outputs,
            revision_feedback,
        })
    }

    async fn apply_record(
        &self,
        session_id: Uuid,
        record: StageRecord,
    ) -> std::result::Result<(), RunError> {
        self.store
            .apply(session_id, record)
            .await
            .map_err(|e| RunError::Fatal(e.to_string()))
    }

    fn stage_failure_fatal(&self, err: InvokeError, kind: StageKind) -> RunError {
        match err {
            InvokeError::Cancelled => RunError::Cancelled,
            InvokeError::Stage { error, .. } => {
                RunError::Fatal(format!("{} stage failed: {}", kind, error.message))
            }
        }
    }

    fn log(&self, session_id: Uuid, level: LogLevel, message: impl Into<String>) {
        self.emitter
            .publish(session_id, ProgressEvent::log(level, message));
    }

    fn progress(&self, session_id: Uuid, done: u32, total: u32, message: String) {
        let percentage = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(99) as u8
        };
        self.emitter
            .publish(session_id, ProgressEvent::progress(percentage, message));
    }
}

/// Invoke a stage with the bounded wait and transient-retry policy.
///
/// Timeouts count as transient. Transient failures are retried up to
/// `stage_retries` times with the same context; permanent failures are
/// not retried. Cancellation wins over everything.
async fn invoke_with_retry(
    processor: Arc<dyn StageProcessor>,
    ctx: StageContext,
    kind: StageKind,
    settings: Settings,
    cancel: CancellationToken,
) -> std::result::Result<(StageOutput, u32), InvokeError> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let invocation = processor.invoke(&ctx);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
            result = tokio::time::timeout(settings.stage_timeout, invocation) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(StageError::transient(format!(
                        "{} stage timed out after {:?}",
                        kind, settings.stage_timeout
                    ))),
                }
            }
        };

        match outcome {
            Ok(output) => return Ok((output, attempts)),
            Err(error) if error.kind == StageErrorKind::Transient
                && attempts <= settings.stage_retries =>
            {
                tracing::warn!(
                    stage = %kind,
                    attempt = attempts,
                    retries = settings.stage_retries,
                    error = %error.message,
                    "transient stage failure, retrying"
                );
            }
            Err(error) => return Err(InvokeError::Stage { error, attempts }),
        }
    }
}
