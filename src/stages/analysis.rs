use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// How much of the data file is handed to the model. Tabular headers
/// plus a sample are enough for a structural analysis.
const MAX_DATA_PREVIEW_BYTES: usize = 16 * 1024;

/// Data analysis stage: summarizes an uploaded tabular data file in the
/// context of the research goal.
pub struct DataAnalyst {
    llm: Arc<dyn LlmClient>,
}

impl DataAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageProcessor for DataAnalyst {
    fn kind(&self) -> StageKind {
        StageKind::Analysis
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let path = ctx.data_file.as_ref().ok_or_else(|| {
            StageError::permanent("analysis stage invoked without a data file")
        })?;

        let raw = tokio::fs::read(path).await.map_err(|e| {
            // A vanished or unreadable upload will not fix itself on retry.
            StageError::permanent(format!("cannot read data file {}: {}", path.display(), e))
        })?;

        let preview_len = raw.len().min(MAX_DATA_PREVIEW_BYTES);
        let preview = String::from_utf8_lossy(&raw[..preview_len]);

        let prompt = format!(
            r#"Research goal: {}

Data file: {} ({} bytes, first {} bytes shown)

{}

Analyze this data in the context of the research goal. Include:
1. Structure of the data (columns, units, coverage)
2. Notable patterns, trends and outliers
3. How the data supports or contradicts the research goal
4. Limitations of the data

Provide a concise analytical summary."#,
            ctx.goal,
            path.display(),
            raw.len(),
            preview_len,
            preview
        );

        let summary = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        Ok(StageOutput::Analysis { summary })
    }
}
