//! Quality-gated refinement: a sequential state machine that drafts or
//! accepts a draft, scores it, and loops through refinement until it clears
//! the quality and final gates or the iteration budget runs out.

pub mod gates;
mod nodes;
mod state;
mod usage;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;

use crate::collaborators::{Generator, QualityScorer};
use crate::config::{BrieflowConfig, PipelineConfig, PricingConfig};
use crate::error::ErrorKind;
use crate::unit::panic_message;

pub use gates::{FinalRoute, QualityRoute, final_gate, quality_gate};
pub use nodes::{NodeError, NodeResult, format_for_client};
pub use state::{
    CompletionStatus, PipelineError, PipelineNode, PipelineState, PipelineSummary,
    RefinementAction,
};
pub use usage::ResourceUsage;

pub struct RefinementPipeline {
    generator: Arc<dyn Generator>,
    scorer: Arc<dyn QualityScorer>,
    config: PipelineConfig,
    pricing: PricingConfig,
    chars_per_token: usize,
}

impl RefinementPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        scorer: Arc<dyn QualityScorer>,
        config: &BrieflowConfig,
    ) -> Self {
        Self {
            generator,
            scorer,
            config: config.pipeline.clone(),
            pricing: config.pricing.clone(),
            chars_per_token: config.drafting.chars_per_token,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.config.max_iterations
    }

    /// Drive `state` to a terminal status. Never returns an in-progress
    /// state; node errors and panics inside a node end the run with `Failed`.
    pub async fn run(&self, state: PipelineState) -> PipelineState {
        let mut state = state;
        let mut node = PipelineNode::ContextAssembly;

        loop {
            state.visited.push(node);
            tracing::debug!(
                node = %node,
                iteration = state.current_iteration,
                "entering pipeline node"
            );

            let step = AssertUnwindSafe(self.step(node, &state)).catch_unwind().await;
            let failure = match step {
                Ok(Ok(next)) => {
                    state = next;
                    None
                }
                Ok(Err(err)) => Some(err.to_string()),
                Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
            };
            if let Some(message) = failure {
                tracing::error!(node = %node, error = %message, "pipeline node failed");
                state.errors.push(PipelineError {
                    node,
                    kind: ErrorKind::System,
                    message,
                    recoverable: true,
                    timestamp: Utc::now(),
                });
                state.status = CompletionStatus::Failed;
                state.completed_at = Some(Utc::now());
                return state;
            }

            match self.next_node(&mut state, node) {
                Some(next) => node = next,
                None => break,
            }
        }

        state.completed_at = Some(Utc::now());
        tracing::info!(
            status = %state.status,
            score = ?state.quality_score,
            iterations = state.current_iteration,
            "refinement pipeline finished"
        );
        state
    }

    async fn step(&self, node: PipelineNode, state: &PipelineState) -> NodeResult {
        match node {
            PipelineNode::ContextAssembly => self.context_assembly(state).await,
            PipelineNode::DocumentGeneration => self.document_generation(state).await,
            PipelineNode::BasicRefinement => self.basic_refinement(state).await,
            PipelineNode::QualityAnalysis => self.quality_analysis(state).await,
            PipelineNode::Refinement => self.refinement(state).await,
            PipelineNode::FinalRefinement => self.final_refinement(state).await,
            PipelineNode::ClientReadiness => self.client_readiness(state).await,
        }
    }

    /// Apply the gates after `current` and pick the next node. Gate flags
    /// reflect the most recent evaluation.
    fn next_node(&self, state: &mut PipelineState, current: PipelineNode) -> Option<PipelineNode> {
        match current {
            PipelineNode::ContextAssembly => Some(PipelineNode::DocumentGeneration),
            PipelineNode::DocumentGeneration => Some(PipelineNode::BasicRefinement),
            PipelineNode::BasicRefinement => Some(PipelineNode::QualityAnalysis),
            PipelineNode::Refinement | PipelineNode::FinalRefinement => {
                Some(PipelineNode::QualityAnalysis)
            }
            PipelineNode::ClientReadiness => None,
            PipelineNode::QualityAnalysis => {
                match quality_gate(state, self.config.quality_threshold) {
                    QualityRoute::Refine => {
                        state.passed_quality_gate = false;
                        state.passed_final_gate = false;
                        Some(PipelineNode::Refinement)
                    }
                    QualityRoute::Unresolved => {
                        state.passed_quality_gate = false;
                        state.passed_final_gate = false;
                        state.status = CompletionStatus::Unresolved;
                        state.warnings.push(format!(
                            "quality gate not reached after {} iterations",
                            state.current_iteration
                        ));
                        Some(PipelineNode::ClientReadiness)
                    }
                    QualityRoute::FinalGate => {
                        state.passed_quality_gate = true;
                        match final_gate(state, self.config.final_threshold) {
                            FinalRoute::FinalRefine => {
                                state.passed_final_gate = false;
                                Some(PipelineNode::FinalRefinement)
                            }
                            FinalRoute::Approve(status) => {
                                state.passed_final_gate = status == CompletionStatus::FinalApproved;
                                state.status = status;
                                Some(PipelineNode::ClientReadiness)
                            }
                        }
                    }
                }
            }
        }
    }
}
