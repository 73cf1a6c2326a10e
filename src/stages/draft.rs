use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Drafting stage: writes one manuscript iteration from the outline and
/// synthesis. Reviewer feedback from earlier attempts, when present, is
/// folded into the prompt so each revision addresses it.
pub struct AcademicWriter {
    llm: Arc<dyn LlmClient>,
}

impl AcademicWriter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageProcessor for AcademicWriter {
    fn kind(&self) -> StageKind {
        StageKind::Draft
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let outline = ctx.outputs.outline.as_deref().ok_or_else(|| {
            StageError::permanent("draft stage requires a completed outline")
        })?;
        let synthesis = ctx.outputs.synthesis.as_deref().unwrap_or_default();

        let style = match ctx.domain_profile.as_deref() {
            Some(domain) => format!(
                "Write in a style appropriate for the {} domain.",
                domain
            ),
            None => "Write in a clear, professional academic style.".to_string(),
        };

        let feedback = if ctx.revision_feedback.is_empty() {
            String::new()
        } else {
            format!(
                "\nReviewer feedback on earlier drafts, address every point:\n{}\n",
                ctx.revision_feedback.join("\n---\n")
            )
        };

        let prompt = format!(
            r#"Research goal: {}

Outline:
{}

Synthesized findings:
{}
{}
Write the full research report following the outline. {} Ground every
claim in the synthesized findings and keep statements traceable to
their sources."#,
            ctx.goal, outline, synthesis, feedback, style
        );

        let content = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        if content.trim().is_empty() {
            return Err(StageError::transient("draft stage produced empty content"));
        }

        Ok(StageOutput::Draft { content })
    }
}
