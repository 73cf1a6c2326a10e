//! Branch Coordinator: modality classification and Execution Plan
//! construction.
//!
//! The plan is derived once per session and never mutated mid-run. A
//! group with more than one stage is a fan-out; execution joins at the
//! group boundary before the next group starts.

use crate::types::{Modality, StageKind, WorkflowKind};
use std::path::Path;
use std::sync::Arc;

/// Classifies a session's research modality from the goal text and the
/// presence of a data file. The precise linguistic classifier is an
/// external collaborator; the coordinator only consumes its categorical
/// output.
pub trait ModalityClassifier: Send + Sync {
    fn classify(&self, goal: &str, has_data_file: bool) -> Modality;
}

/// Default heuristic: research-question phrasing in the goal marks
/// literature intent.
pub struct KeywordClassifier {
    research_markers: Vec<&'static str>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            research_markers: vec![
                "impact", "effect", "influence", "relationship", "correlat", "compare",
                "why", "how", "what", "trend", "review", "literature", "?",
            ],
        }
    }
}

impl ModalityClassifier for KeywordClassifier {
    fn classify(&self, goal: &str, has_data_file: bool) -> Modality {
        if !has_data_file {
            return Modality::Literature;
        }
        let lower = goal.to_lowercase();
        let has_research_language = self
            .research_markers
            .iter()
            .any(|marker| lower.contains(marker));
        if has_research_language {
            Modality::Hybrid
        } else {
            Modality::Data
        }
    }
}

/// One stage invocation in the plan, with its progress weight.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub kind: StageKind,
    pub weight: u32,
}

/// A set of stages that run concurrently, joined before the next group.
#[derive(Debug, Clone)]
pub struct StageGroup {
    pub stages: Vec<PlannedStage>,
}

impl StageGroup {
    fn single(kind: StageKind, weight: u32) -> Self {
        Self {
            stages: vec![PlannedStage { kind, weight }],
        }
    }

    pub fn is_fan_out(&self) -> bool {
        self.stages.len() > 1
    }

    pub fn weight(&self) -> u32 {
        self.stages.iter().map(|s| s.weight).sum()
    }
}

/// Ordered execution plan for one session. Immutable after creation.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub modality: Modality,
    pub groups: Vec<StageGroup>,
}

impl ExecutionPlan {
    pub fn total_weight(&self) -> u32 {
        self.groups.iter().map(StageGroup::weight).sum()
    }

    /// True when the plan contains a concurrent research fan-out.
    pub fn has_fan_out(&self) -> bool {
        self.groups.iter().any(StageGroup::is_fan_out)
    }
}

/// Builds execution plans from the classified modality.
pub struct BranchCoordinator {
    classifier: Arc<dyn ModalityClassifier>,
}

impl BranchCoordinator {
    pub fn new(classifier: Arc<dyn ModalityClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classify(&self, goal: &str, data_file: Option<&Path>) -> Modality {
        self.classifier.classify(goal, data_file.is_some())
    }

    /// Derive the execution plan for a session.
    ///
    /// The plan lists one draft and one review invocation; the revision
    /// loop controller may repeat that pair up to its bound, which does
    /// not change the plan itself.
    pub fn plan(&self, goal: &str, data_file: Option<&Path>) -> ExecutionPlan {
        let modality = self.classify(goal, data_file);

        let research_group = match modality {
            Modality::Literature => StageGroup::single(StageKind::Literature, 1),
            Modality::Data => StageGroup::single(StageKind::Analysis, 1),
            Modality::Hybrid => StageGroup {
                stages: vec![
                    PlannedStage {
                        kind: StageKind::Literature,
                        weight: 1,
                    },
                    PlannedStage {
                        kind: StageKind::Analysis,
                        weight: 1,
                    },
                ],
            },
        };

        let groups = vec![
            research_group,
            StageGroup::single(StageKind::Synthesis, 1),
            StageGroup::single(StageKind::Outline, 1),
            // Drafting is the heavy stage
            StageGroup::single(StageKind::Draft, 2),
            StageGroup::single(StageKind::Review, 1),
            StageGroup::single(StageKind::Citation, 1),
        ];

        ExecutionPlan { modality, groups }
    }
}

impl Default for BranchCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier::default()))
    }
}

/// Workflow kind does not alter plan structure; it alters the revision
/// bound (and, for `domain`, the drafting style profile).
pub fn revision_bound_for(workflow: WorkflowKind, configured: u32) -> u32 {
    match workflow {
        // The simple pipeline runs a single draft pass
        WorkflowKind::Simple => 0,
        WorkflowKind::Enhanced | WorkflowKind::Domain => configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn no_data_file_means_literature() {
        let coordinator = BranchCoordinator::default();
        let modality = coordinator.classify("Impact of X on Y", None);
        assert_eq!(modality, Modality::Literature);
    }

    #[test]
    fn data_file_with_research_language_means_hybrid() {
        let coordinator = BranchCoordinator::default();
        let file = PathBuf::from("uploads/data.csv");
        let modality = coordinator.classify("Impact of X on Y", Some(&file));
        assert_eq!(modality, Modality::Hybrid);
    }

    #[test]
    fn data_file_without_research_language_means_data() {
        let coordinator = BranchCoordinator::default();
        let file = PathBuf::from("uploads/data.csv");
        let modality = coordinator.classify("Summarize quarterly sales figures", Some(&file));
        assert_eq!(modality, Modality::Data);
    }

    #[test]
    fn literature_plan_has_no_fan_out() {
        let coordinator = BranchCoordinator::default();
        let plan = coordinator.plan("Impact of X on Y", None);
        assert_eq!(plan.modality, Modality::Literature);
        assert!(!plan.has_fan_out());
        assert_eq!(plan.groups[0].stages[0].kind, StageKind::Literature);
    }

    #[test]
    fn hybrid_plan_fans_out_before_synthesis() {
        let coordinator = BranchCoordinator::default();
        let file = PathBuf::from("uploads/data.csv");
        let plan = coordinator.plan("Impact of X on Y", Some(&file));

        assert_eq!(plan.modality, Modality::Hybrid);
        assert!(plan.groups[0].is_fan_out());
        assert_eq!(plan.groups[0].stages.len(), 2);
        // The join barrier sits right before synthesis
        assert_eq!(plan.groups[1].stages[0].kind, StageKind::Synthesis);
    }

    #[test]
    fn draft_carries_extra_weight() {
        let plan = BranchCoordinator::default().plan("goal", None);
        let draft = plan
            .groups
            .iter()
            .flat_map(|g| &g.stages)
            .find(|s| s.kind == StageKind::Draft)
            .unwrap();
        assert_eq!(draft.weight, 2);
        assert_eq!(plan.total_weight(), 7);
    }

    #[test]
    fn simple_workflow_disables_revision_loop() {
        assert_eq!(revision_bound_for(WorkflowKind::Simple, 2), 0);
        assert_eq!(revision_bound_for(WorkflowKind::Enhanced, 2), 2);
        assert_eq!(revision_bound_for(WorkflowKind::Domain, 3), 3);
    }
}
