use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Citation formatting stage: produces the reference list for the
/// accepted (or selected) draft from the collected sources.
pub struct CitationFormatter {
    llm: Arc<dyn LlmClient>,
}

impl CitationFormatter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageProcessor for CitationFormatter {
    fn kind(&self) -> StageKind {
        StageKind::Citation
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let draft = ctx.outputs.draft.as_deref().ok_or_else(|| {
            StageError::permanent("citation stage requires a final draft")
        })?;

        let sources = ctx
            .outputs
            .literature
            .as_ref()
            .map(|l| {
                l.sources
                    .iter()
                    .map(|s| match &s.url {
                        Some(url) => format!("- {} | {}", s.title, url),
                        None => format!("- {}", s.title),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| "(no collected sources; cite the data analysis)".to_string());

        let prompt = format!(
            r#"Report:
{}

Collected sources:
{}

Produce a formatted reference list for this report. Use a consistent
academic citation style, one reference per line, ordered as cited.
Output only the reference list."#,
            draft, sources
        );

        let text = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        Ok(StageOutput::Citations { text })
    }
}
