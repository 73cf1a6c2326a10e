use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Synthesis stage: merges the literature and data branches into one
/// set of structured findings. Runs after the join barrier, so it may
/// see either branch missing when the plan was degraded.
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageProcessor for Synthesizer {
    fn kind(&self) -> StageKind {
        StageKind::Synthesis
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let literature = ctx
            .outputs
            .literature
            .as_ref()
            .map(|l| l.findings.as_str())
            .unwrap_or("(no literature branch output)");
        let analysis = ctx
            .outputs
            .analysis
            .as_deref()
            .unwrap_or("(no data analysis branch output)");

        if ctx.outputs.literature.is_none() && ctx.outputs.analysis.is_none() {
            return Err(StageError::permanent(
                "synthesis requires at least one completed research branch",
            ));
        }

        let prompt = format!(
            r#"Research goal: {}

Literature findings:
{}

Data analysis:
{}

Synthesize these findings into a structured research summary. Include:
1. Main findings and trends
2. Identified research gaps
3. Practical implications
4. Every statement must be traceable to the findings above

Provide a clear, professional synthesis."#,
            ctx.goal, literature, analysis
        );

        let text = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        Ok(StageOutput::Synthesis { text })
    }
}
