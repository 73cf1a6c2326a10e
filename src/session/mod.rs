//! Session State Store: the single source of truth for a session's
//! accumulated data.
//!
//! Every mutation goes through this store; stages and coordinators
//! never touch session state directly. Updates for one session are
//! serialized through a per-session async mutex while different
//! sessions proceed independently.

use crate::stages::{StageErrorKind, StageOutput, StageOutputs};
use crate::types::{AppError, Modality, Result, SessionStatus, StageKind, WorkflowKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One immutable manuscript iteration with its review score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftVersion {
    /// Monotonic, 1-based, never reused within a session
    pub number: u32,
    pub content: String,
    /// Review score on the 1-10 scale
    pub score: u8,
    /// Scoring rationale from the review stage
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// Recorded outcome of one stage invocation. Immutable once applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    /// Invocation attempts consumed, including retries
    pub attempts: u32,
    pub outcome: StageOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum StageOutcome {
    Success { output: StageOutput },
    Failure { kind: StageErrorKind, message: String },
}

impl StageRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, StageOutcome::Success { .. })
    }
}

/// One research run from goal submission to terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub goal: String,
    pub workflow: WorkflowKind,
    pub data_file: Option<PathBuf>,
    pub modality: Option<Modality>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Typed accumulation of stage contributions
    pub outputs: StageOutputs,
    /// All stage invocation records, in application order
    pub stage_records: Vec<StageRecord>,
    /// Append-only draft history; numbers strictly increase
    pub drafts: Vec<DraftVersion>,
    /// Notes recorded when a hybrid plan degrades to a single branch
    pub degradation_notes: Vec<String>,
    /// Final artifact names, populated on completion
    pub artifacts: Vec<String>,
    /// Failure detail when status is `Failed`
    pub failure: Option<String>,
    /// The selected final report content, populated on completion
    pub final_content: Option<String>,
}

impl Session {
    fn new(goal: String, workflow: WorkflowKind, data_file: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal,
            workflow,
            data_file,
            modality: None,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            outputs: StageOutputs::default(),
            stage_records: Vec::new(),
            drafts: Vec::new(),
            degradation_notes: Vec::new(),
            artifacts: Vec::new(),
            failure: None,
            final_content: None,
        }
    }

    /// The highest-scoring draft, ties broken by lowest version number.
    /// Deterministic selection for the `Exhausted` terminal state.
    pub fn best_draft(&self) -> Option<&DraftVersion> {
        self.drafts
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(b.number.cmp(&a.number)))
    }
}

fn transition_allowed(from: SessionStatus, to: SessionStatus) -> bool {
    matches!(
        (from, to),
        (SessionStatus::Pending, SessionStatus::Running)
            | (SessionStatus::Running, SessionStatus::Completed)
            | (SessionStatus::Running, SessionStatus::Failed)
    )
}

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    cancel: CancellationToken,
}

/// In-memory store of all sessions, keyed by id.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new pending session and return its id.
    pub fn create(
        &self,
        goal: String,
        workflow: WorkflowKind,
        data_file: Option<PathBuf>,
    ) -> Uuid {
        let session = Session::new(goal, workflow, data_file);
        let id = session.id;
        let entry = Arc::new(SessionEntry {
            session: Arc::new(Mutex::new(session)),
            cancel: CancellationToken::new(),
        });
        self.sessions.write().insert(id, entry);
        id
    }

    fn entry(&self, id: Uuid) -> Result<Arc<SessionEntry>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {} not found", id)))
    }

    /// Cancellation token for a session; cancelling it propagates to all
    /// in-flight stage invocations of that session.
    pub fn cancel_token(&self, id: Uuid) -> Result<CancellationToken> {
        Ok(self.entry(id)?.cancel.clone())
    }

    /// Move a session along its lifecycle. Illegal transitions are
    /// rejected, keeping `pending -> running -> {completed, failed}` the
    /// only reachable path.
    pub async fn set_status(&self, id: Uuid, to: SessionStatus) -> Result<()> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        if !transition_allowed(session.status, to) {
            return Err(AppError::Internal(format!(
                "illegal session transition {:?} -> {:?}",
                session.status, to
            )));
        }
        session.status = to;
        Ok(())
    }

    pub async fn set_modality(&self, id: Uuid, modality: Modality) -> Result<()> {
        let entry = self.entry(id)?;
        entry.session.lock().await.modality = Some(modality);
        Ok(())
    }

    /// Apply a completed stage record. This is the only entry point that
    /// merges stage outputs into session state, which is what prevents
    /// lost updates between concurrently running branch stages.
    pub async fn apply(&self, id: Uuid, record: StageRecord) -> Result<()> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;

        if let StageOutcome::Success { output } = &record.outcome {
            match output {
                StageOutput::Literature(findings) => {
                    session.outputs.literature = Some(findings.clone());
                }
                StageOutput::Analysis { summary } => {
                    session.outputs.analysis = Some(summary.clone());
                }
                StageOutput::Synthesis { text } => {
                    session.outputs.synthesis = Some(text.clone());
                }
                StageOutput::Outline { text } => {
                    session.outputs.outline = Some(text.clone());
                }
                StageOutput::Draft { content } => {
                    session.outputs.draft = Some(content.clone());
                }
                StageOutput::Citations { text } => {
                    session.outputs.citations = Some(text.clone());
                }
                // Review results live in the draft history, not the
                // accumulated outputs.
                StageOutput::Review { .. } => {}
            }
        }
        session.stage_records.push(record);
        Ok(())
    }

    /// Append the next draft version. Numbering is assigned here so it
    /// is strictly increasing and never reused.
    pub async fn append_draft(
        &self,
        id: Uuid,
        content: String,
        score: u8,
        feedback: String,
    ) -> Result<DraftVersion> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        let number = session.drafts.last().map(|d| d.number).unwrap_or(0) + 1;
        let version = DraftVersion {
            number,
            content,
            score,
            feedback,
            created_at: Utc::now(),
        };
        session.drafts.push(version.clone());
        Ok(version)
    }

    pub async fn add_degradation_note(&self, id: Uuid, note: String) -> Result<()> {
        let entry = self.entry(id)?;
        entry.session.lock().await.degradation_notes.push(note);
        Ok(())
    }

    /// Mark a session completed with its final content and artifact list.
    pub async fn finalize(
        &self,
        id: Uuid,
        final_content: String,
        artifacts: Vec<String>,
    ) -> Result<()> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        if !transition_allowed(session.status, SessionStatus::Completed) {
            return Err(AppError::Internal(format!(
                "illegal session transition {:?} -> Completed",
                session.status
            )));
        }
        session.status = SessionStatus::Completed;
        session.final_content = Some(final_content);
        session.artifacts = artifacts;
        Ok(())
    }

    /// Mark a session failed. All recorded history (stage records,
    /// draft versions) is retained.
    pub async fn fail(&self, id: Uuid, detail: String) -> Result<()> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        if !transition_allowed(session.status, SessionStatus::Failed) {
            return Err(AppError::Internal(format!(
                "illegal session transition {:?} -> Failed",
                session.status
            )));
        }
        session.status = SessionStatus::Failed;
        session.failure = Some(detail);
        Ok(())
    }

    /// Immutable copy of the session for external reporting.
    pub async fn snapshot(&self, id: Uuid) -> Result<Session> {
        let entry = self.entry(id)?;
        let session = entry.session.lock().await;
        Ok(session.clone())
    }

    /// Ids of sessions currently in the `Running` state.
    pub async fn running_sessions(&self) -> Vec<Uuid> {
        let entries: Vec<Arc<SessionEntry>> = self.sessions.read().values().cloned().collect();
        let mut running = Vec::new();
        for entry in entries {
            let session = entry.session.lock().await;
            if session.status == SessionStatus::Running {
                running.push(session.id);
            }
        }
        running
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::LiteratureFindings;

    fn record(output: StageOutput) -> StageRecord {
        StageRecord {
            stage: output.kind(),
            attempts: 1,
            outcome: StageOutcome::Success { output },
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn status_transitions_are_restricted() {
        let store = SessionStore::new();
        let id = store.create("goal".into(), WorkflowKind::Simple, None);

        // Pending -> Completed is not reachable
        assert!(store.finalize(id, "x".into(), vec![]).await.is_err());
        // Pending -> Failed is not reachable
        assert!(store.fail(id, "x".into()).await.is_err());

        store.set_status(id, SessionStatus::Running).await.unwrap();
        // Running -> Running is not reachable
        assert!(store.set_status(id, SessionStatus::Running).await.is_err());

        store.finalize(id, "done".into(), vec!["report.md".into()]).await.unwrap();
        // Terminal states accept nothing further
        assert!(store.fail(id, "late".into()).await.is_err());

        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn draft_numbers_strictly_increase() {
        let store = SessionStore::new();
        let id = store.create("goal".into(), WorkflowKind::Enhanced, None);

        for i in 1..=3u32 {
            let v = store
                .append_draft(id, format!("draft {}", i), 5, "feedback".into())
                .await
                .unwrap();
            assert_eq!(v.number, i);
        }

        let snap = store.snapshot(id).await.unwrap();
        let numbers: Vec<u32> = snap.drafts.iter().map(|d| d.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn best_draft_prefers_highest_then_earliest() {
        let store = SessionStore::new();
        let id = store.create("goal".into(), WorkflowKind::Enhanced, None);
        store.append_draft(id, "a".into(), 5, "".into()).await.unwrap();
        store.append_draft(id, "b".into(), 6, "".into()).await.unwrap();
        store.append_draft(id, "c".into(), 6, "".into()).await.unwrap();

        let snap = store.snapshot(id).await.unwrap();
        let best = snap.best_draft().unwrap();
        assert_eq!(best.score, 6);
        assert_eq!(best.number, 2, "ties break to the earliest attempt");
    }

    #[tokio::test]
    async fn apply_merges_outputs_and_keeps_records() {
        let store = SessionStore::new();
        let id = store.create("goal".into(), WorkflowKind::Enhanced, None);

        store
            .apply(
                id,
                record(StageOutput::Literature(LiteratureFindings {
                    findings: "findings".into(),
                    sources: vec![],
                })),
            )
            .await
            .unwrap();
        store
            .apply(id, record(StageOutput::Synthesis { text: "synth".into() }))
            .await
            .unwrap();

        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.outputs.literature.unwrap().findings, "findings");
        assert_eq!(snap.outputs.synthesis.as_deref(), Some("synth"));
        assert_eq!(snap.stage_records.len(), 2);
    }

    #[tokio::test]
    async fn failure_preserves_history() {
        let store = SessionStore::new();
        let id = store.create("goal".into(), WorkflowKind::Enhanced, None);
        store.set_status(id, SessionStatus::Running).await.unwrap();
        store.append_draft(id, "partial".into(), 4, "weak".into()).await.unwrap();

        store.fail(id, "synthesis stage failed".into()).await.unwrap();

        let snap = store.snapshot(id).await.unwrap();
        assert_eq!(snap.status, SessionStatus::Failed);
        assert_eq!(snap.drafts.len(), 1);
        assert_eq!(snap.failure.as_deref(), Some("synthesis stage failed"));
    }
}
