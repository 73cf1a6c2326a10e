//! Session-scoped artifact storage.
//!
//! Each session writes its draft history and final deliverables under
//! `results/<workflow>_<session-id>/`, never shared or overwritten
//! across sessions.

use crate::session::DraftVersion;
use crate::types::{AppError, Result, WorkflowKind};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    results_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Session-scoped directory, keyed by session id.
    pub fn session_dir(&self, workflow: WorkflowKind, session_id: Uuid) -> PathBuf {
        self.results_dir
            .join(format!("{}_research_{}", workflow.as_str(), session_id))
    }

    pub async fn ensure_session_dir(
        &self,
        workflow: WorkflowKind,
        session_id: Uuid,
    ) -> Result<PathBuf> {
        let dir = self.session_dir(workflow, session_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Persist one draft iteration as `draft_v<n>.md`.
    pub async fn write_draft(&self, dir: &Path, version: &DraftVersion) -> Result<String> {
        let name = format!("draft_v{}.md", version.number);
        let body = format!(
            "# Draft version {} (score {})\n\n{}\n\n---\nReviewer feedback:\n{}\n",
            version.number, version.score, version.content, version.feedback
        );
        tokio::fs::write(dir.join(&name), body).await?;
        Ok(name)
    }

    /// Persist the final report with its header block.
    pub async fn write_report(
        &self,
        dir: &Path,
        goal: &str,
        workflow: WorkflowKind,
        session_id: Uuid,
        content: &str,
    ) -> Result<String> {
        let name = format!("research_{}.md", safe_slug(goal));
        let body = format!(
            "# Research Report: {}\n# Workflow: {}\n# Session: {}\n{}\n\n{}\n",
            goal,
            workflow,
            session_id,
            "=".repeat(60),
            content
        );
        tokio::fs::write(dir.join(&name), body).await?;
        Ok(name)
    }

    pub async fn write_citations(&self, dir: &Path, content: &str) -> Result<String> {
        let name = "citations.md".to_string();
        tokio::fs::write(dir.join(&name), content).await?;
        Ok(name)
    }

    /// File names present in a session directory, sorted.
    pub async fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read one artifact's bytes. The name must be a plain file name;
    /// anything that could escape the session directory is rejected.
    pub async fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(AppError::InvalidInput(format!(
                "invalid artifact name: {}",
                name
            )));
        }
        let path = dir.join(name);
        tokio::fs::read(&path)
            .await
            .map_err(|_| AppError::NotFound(format!("artifact {} not found", name)))
    }
}

/// Filesystem-safe fragment of the goal text for report file names.
fn safe_slug(goal: &str) -> String {
    let filtered: String = goal
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    let slug: String = filtered.trim().replace(' ', "_");
    slug.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn slug_filters_and_truncates() {
        assert_eq!(safe_slug("Impact of X on Y!"), "Impact_of_X_on_Y");
        assert_eq!(safe_slug("a").len(), 1);
        assert!(safe_slug(&"long goal statement ".repeat(10)).len() <= 30);
    }

    #[tokio::test]
    async fn writes_and_lists_session_artifacts() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let id = Uuid::new_v4();
        let dir = store
            .ensure_session_dir(WorkflowKind::Enhanced, id)
            .await
            .unwrap();

        let draft = DraftVersion {
            number: 1,
            content: "body".into(),
            score: 6,
            feedback: "tighten".into(),
            created_at: Utc::now(),
        };
        store.write_draft(&dir, &draft).await.unwrap();
        store
            .write_report(&dir, "Impact of X on Y", WorkflowKind::Enhanced, id, "final")
            .await
            .unwrap();
        store.write_citations(&dir, "- ref 1").await.unwrap();

        let names = store.list(&dir).await.unwrap();
        assert_eq!(
            names,
            vec![
                "citations.md".to_string(),
                "draft_v1.md".to_string(),
                "research_Impact_of_X_on_Y.md".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn read_rejects_traversal() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let dir = tmp.path().to_path_buf();
        let err = store.read(&dir, "../escape.txt").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
