use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Outline planning stage: turns the synthesis into a section plan for
/// the report.
pub struct OutlinePlanner {
    llm: Arc<dyn LlmClient>,
}

impl OutlinePlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageProcessor for OutlinePlanner {
    fn kind(&self) -> StageKind {
        StageKind::Outline
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let synthesis = ctx.outputs.synthesis.as_deref().ok_or_else(|| {
            StageError::permanent("outline stage requires a completed synthesis")
        })?;

        let prompt = format!(
            r#"Research goal: {}

Synthesized findings:
{}

Create a strategic outline for a research report answering this goal.
Number each section, give it a title and 2-3 bullet points of intended
content. Include an introduction, the main analytical sections, and a
conclusion with recommendations."#,
            ctx.goal, synthesis
        );

        let text = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        Ok(StageOutput::Outline { text })
    }
}
