//! Revision Loop Controller.
//!
//! A bounded state machine over `{Drafting, Reviewing, Revising,
//! Accepted, Exhausted}` wrapped around the draft/review stage pair.
//! The orchestrator produces drafts and scores; the controller decides
//! transitions, so looping can never be unbounded: any score sequence
//! terminates within `max_attempts + 1` draft productions.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionPhase {
    Drafting,
    Reviewing,
    Revising,
    Accepted,
    Exhausted,
}

/// Decision taken after scoring a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    /// Score met the threshold; terminal
    Accept,
    /// Below threshold with attempts left; loop back to drafting
    Revise,
    /// Below threshold with the bound reached; terminal, the best
    /// scored version is selected as final output
    Exhaust,
}

#[derive(Debug)]
pub struct RevisionController {
    quality_threshold: u8,
    max_attempts: u32,
    attempts: u32,
    phase: RevisionPhase,
}

impl RevisionController {
    pub fn new(quality_threshold: u8, max_attempts: u32) -> Self {
        Self {
            quality_threshold,
            max_attempts,
            attempts: 0,
            phase: RevisionPhase::Drafting,
        }
    }

    /// Revision attempts consumed so far. Never exceeds the bound.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn phase(&self) -> RevisionPhase {
        self.phase
    }

    /// A new draft version has been produced: `Drafting -> Reviewing`.
    pub fn on_draft(&mut self) {
        debug_assert_eq!(self.phase, RevisionPhase::Drafting);
        self.phase = RevisionPhase::Reviewing;
    }

    /// The scoring oracle has rated the current draft. Decides the
    /// transition out of `Reviewing`.
    pub fn on_score(&mut self, score: u8) -> LoopDecision {
        debug_assert_eq!(self.phase, RevisionPhase::Reviewing);

        if score >= self.quality_threshold {
            self.phase = RevisionPhase::Accepted;
            return LoopDecision::Accept;
        }

        if self.attempts < self.max_attempts {
            self.attempts += 1;
            self.phase = RevisionPhase::Drafting;
            return LoopDecision::Revise;
        }

        self.phase = RevisionPhase::Exhausted;
        LoopDecision::Exhaust
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Drive the controller with a score sequence, returning the number
    /// of drafts produced and the terminal phase.
    fn drive(threshold: u8, max_attempts: u32, scores: &[u8]) -> (u32, RevisionPhase) {
        let mut controller = RevisionController::new(threshold, max_attempts);
        let mut drafts = 0u32;
        for &score in scores {
            controller.on_draft();
            drafts += 1;
            match controller.on_score(score) {
                LoopDecision::Accept | LoopDecision::Exhaust => break,
                LoopDecision::Revise => continue,
            }
        }
        (drafts, controller.phase())
    }

    #[test]
    fn accepts_at_threshold() {
        let (drafts, phase) = drive(7, 2, &[7]);
        assert_eq!(drafts, 1);
        assert_eq!(phase, RevisionPhase::Accepted);
    }

    #[test]
    fn repeated_low_scores_exhaust_after_three_drafts() {
        let (drafts, phase) = drive(7, 2, &[5, 6, 6]);
        assert_eq!(drafts, 3);
        assert_eq!(phase, RevisionPhase::Exhausted);
    }

    #[test]
    fn zero_bound_exhausts_after_single_draft() {
        let (drafts, phase) = drive(7, 0, &[5, 9, 9]);
        assert_eq!(drafts, 1);
        assert_eq!(phase, RevisionPhase::Exhausted);
    }

    #[test]
    fn accepts_mid_loop() {
        let (drafts, phase) = drive(7, 2, &[5, 8]);
        assert_eq!(drafts, 2);
        assert_eq!(phase, RevisionPhase::Accepted);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn terminates_within_bound_plus_one_for_all_low_scores(#[case] max_attempts: u32) {
        // Scores never meet the threshold, so the loop must hit the bound
        let scores = vec![1u8; (max_attempts + 10) as usize];
        let mut controller = RevisionController::new(7, max_attempts);
        let mut drafts = 0u32;
        for &score in &scores {
            controller.on_draft();
            drafts += 1;
            if controller.on_score(score) != LoopDecision::Revise {
                break;
            }
        }
        assert_eq!(drafts, max_attempts + 1);
        assert_eq!(controller.phase(), RevisionPhase::Exhausted);
        assert!(controller.attempts() <= max_attempts);
    }
}
