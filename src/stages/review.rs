use super::{StageContext, StageError, StageOutput, StageProcessor, StageResult};
use crate::llm::LlmClient;
use crate::types::StageKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Quality review stage: the scoring oracle. Scores the current draft
/// on a 1-10 scale and produces feedback for the next revision.
pub struct QualityReviewer {
    llm: Arc<dyn LlmClient>,
}

impl QualityReviewer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Parse a 1-10 score out of reviewer output.
    ///
    /// Handles various output formats:
    /// - Clean output: "SCORE: 7"
    /// - Lowercase or spaced: "score : 7"
    /// - Embedded in prose: "I would give this a score of 7 out of 10"
    fn parse_score(output: &str) -> Option<u8> {
        for line in output.lines() {
            let lower = line.trim().to_lowercase();
            if let Some(rest) = lower.strip_prefix("score") {
                let digits: String = rest
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(score) = digits.parse::<u8>() {
                    if (1..=10).contains(&score) {
                        return Some(score);
                    }
                }
            }
        }

        // Fall back to the first standalone 1-10 number in the text
        for word in output.split(|c: char| !c.is_ascii_digit()) {
            if let Ok(score) = word.parse::<u8>() {
                if (1..=10).contains(&score) {
                    return Some(score);
                }
            }
        }

        None
    }

    fn parse_feedback(output: &str) -> String {
        let lower = output.to_lowercase();
        if let Some(idx) = lower.find("feedback") {
            let after = &output[idx..];
            let after = after
                .trim_start_matches(|c: char| c.is_alphabetic())
                .trim_start_matches([':', ' ', '\n']);
            if !after.trim().is_empty() {
                return after.trim().to_string();
            }
        }
        output.trim().to_string()
    }
}

#[async_trait]
impl StageProcessor for QualityReviewer {
    fn kind(&self) -> StageKind {
        StageKind::Review
    }

    async fn invoke(&self, ctx: &StageContext) -> StageResult<StageOutput> {
        let draft = ctx.outputs.draft.as_deref().ok_or_else(|| {
            StageError::permanent("review stage requires a draft to score")
        })?;

        let prompt = format!(
            r#"Research goal: {}

Draft report:
{}

Review this draft for structure, academic rigor, traceability of claims
and clarity. Respond in exactly this format:

SCORE: <integer 1-10>
FEEDBACK: <specific, actionable feedback for the next revision>"#,
            ctx.goal, draft
        );

        let output = self
            .llm
            .generate(&prompt)
            .await
            .map_err(StageError::from_app)?;

        // An unparseable score is a model hiccup, not a session fault.
        let score = Self::parse_score(&output).ok_or_else(|| {
            StageError::transient(format!(
                "reviewer output contained no score: {:.80}",
                output
            ))
        })?;
        let feedback = Self::parse_feedback(&output);

        Ok(StageOutput::Review { score, feedback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_score_line() {
        assert_eq!(
            QualityReviewer::parse_score("SCORE: 7\nFEEDBACK: tighten section 2"),
            Some(7)
        );
    }

    #[test]
    fn parses_spaced_and_lowercase() {
        assert_eq!(QualityReviewer::parse_score("score : 9"), Some(9));
    }

    #[test]
    fn parses_score_embedded_in_prose() {
        assert_eq!(
            QualityReviewer::parse_score("Overall I would give this a 6 out of 10."),
            Some(6)
        );
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(QualityReviewer::parse_score("SCORE: 42"), None);
        assert_eq!(QualityReviewer::parse_score("no number here"), None);
    }

    #[test]
    fn feedback_extraction() {
        let out = "SCORE: 5\nFEEDBACK: the methods section lacks citations";
        assert_eq!(
            QualityReviewer::parse_feedback(out),
            "the methods section lacks citations"
        );
    }

    #[test]
    fn feedback_falls_back_to_whole_output() {
        assert_eq!(QualityReviewer::parse_feedback("  just prose  "), "just prose");
    }
}
