//! The two routing decisions of the refinement pipeline. Both are pure: they
//! read the state and return a route; the runner applies it.

use super::state::{CompletionStatus, PipelineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityRoute {
    /// Below threshold with iterations left.
    Refine,
    /// At or above threshold.
    FinalGate,
    /// Below threshold and out of iterations.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalRoute {
    /// Below threshold with iterations left.
    FinalRefine,
    /// Terminal: `FinalApproved` or `QualityApproved`.
    Approve(CompletionStatus),
}

/// A missing score never passes.
pub fn quality_gate(state: &PipelineState, threshold: f64) -> QualityRoute {
    let passed = state.quality_score.is_some_and(|s| s >= threshold);
    if passed {
        QualityRoute::FinalGate
    } else if state.iterations_remain() {
        QualityRoute::Refine
    } else {
        QualityRoute::Unresolved
    }
}

pub fn final_gate(state: &PipelineState, threshold: f64) -> FinalRoute {
    let passed = state.quality_score.is_some_and(|s| s >= threshold);
    if passed {
        FinalRoute::Approve(CompletionStatus::FinalApproved)
    } else if state.iterations_remain() {
        FinalRoute::FinalRefine
    } else {
        FinalRoute::Approve(CompletionStatus::QualityApproved)
    }
}
