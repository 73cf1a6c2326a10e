use super::{LiteratureFindings, StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::{Source, StageKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Literature discovery stage: collects relevant sources and findings
/// for the research goal.
pub struct LiteratureScout {
    llm: Arc<dyn LlmClient>,
}

impl LiteratureScout {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Pull source entries out of the model's free-text findings.
    ///
    /// Accepts lines of the form `- Title | URL` or `- Title`, with or
    /// without list markers or numbering.
    fn extract_sources(findings: &str) -> Vec<Source> {
        findings
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('-') || line.starts_with(|c: char| c.is_numeric()))
            .map(|line| {
                let entry = line
                    .trim_start_matches(|c: char| c.is_numeric() || c == '-' || c == '.' || c == ')')
                    .trim();
                let (title, url) = match entry.split_once('|') {
                    Some((t, u)) => (t.trim().to_string(), Some(u.trim().to_string())),
                    None => (entry.to_string(), None),
                };
                Source {
                    title,
                    url,
                    relevance_score: 0.8,
                }
            })
            .filter(|s| !s.title.is_empty())
            .collect()
    }
}

#[async_trait]
impl StageProcessor for LiteratureScout {
    fn kind(&self) -> StageKind {
        StageKind::Literature
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let prompt = format!(
            r#"Research goal: {}

Collect relevant academic literature for this goal. Focus on:
1. Research from the last 5 years
2. High-impact journal publications
3. Systematic literature reviews
4. Reliable academic sources

Summarize the key findings, then list the sources, one per line, as:
- Title | URL

Every claim in the summary must be traceable to a listed source."#,
            ctx.goal
        );

        let findings = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        let sources = Self::extract_sources(&findings);
        tracing::debug!(
            session_id = %ctx.session_id,
            sources = sources.len(),
            "literature stage collected sources"
        );

        Ok(StageOutput::Literature(LiteratureFindings {
            findings,
            sources,
        }))
    }
}
