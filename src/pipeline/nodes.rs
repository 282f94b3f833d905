use chrono::Utc;
use thiserror::Error;

use super::RefinementPipeline;
use super::state::{PipelineNode, PipelineState, RefinementAction};
use crate::collaborators::{GenerationRequest, Instruction};
use crate::drafting::merge::polish;
use crate::drafting::worker::{estimate_tokens, scan_placeholders};
use crate::error::CollaboratorError;
use crate::router::ModelTier;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("{0}")]
    Invalid(String),
}

pub type NodeResult = Result<PipelineState, NodeError>;

impl RefinementPipeline {
    pub(super) async fn context_assembly(&self, state: &PipelineState) -> NodeResult {
        let mut next = state.clone();
        next.template.validate().map_err(NodeError::Invalid)?;
        if next.template.document_type != next.matter.document_type {
            return Err(NodeError::Invalid(format!(
                "matter is for {} but template drafts {}",
                next.matter.document_type, next.template.document_type
            )));
        }
        if !next.matter.validation.valid {
            return Err(NodeError::Invalid(format!(
                "matter failed intake validation: {}",
                next.matter.validation.errors.join("; ")
            )));
        }

        next.warnings
            .extend(next.matter.validation.warnings.iter().cloned());
        if next.context.is_empty() {
            next.warnings
                .push("no supporting precedent retrieved; drafting without grounding".into());
        }
        Ok(next)
    }

    pub(super) async fn document_generation(&self, state: &PipelineState) -> NodeResult {
        let mut next = state.clone();
        if next.generated_document.is_some() {
            tracing::debug!("using orchestrator draft as generated document");
            return Ok(next);
        }

        let tier = self.config.tiers.generation;
        let text = self
            .generate(&mut next, Instruction::Draft, tier)
            .await?;
        next.generated_document = Some(text);
        Ok(next)
    }

    pub(super) async fn basic_refinement(&self, state: &PipelineState) -> NodeResult {
        let mut next = state.clone();
        let tier = self.config.tiers.basic_refinement;
        let text = polish(&self.generate(&mut next, Instruction::Polish, tier).await?);

        for token in scan_placeholders(&text) {
            next.warnings
                .push(format!("unresolved placeholder {token} after basic refinement"));
        }
        next.refinement_history
            .push(action(&next, PipelineNode::BasicRefinement, tier));
        next.refined_document = Some(text);
        Ok(next)
    }

    pub(super) async fn quality_analysis(&self, state: &PipelineState) -> NodeResult {
        let mut next = state.clone();
        let document = next
            .current_document()
            .ok_or_else(|| NodeError::Invalid("no document to analyze".into()))?
            .to_string();

        let report = self
            .scorer
            .analyze(&document, &next.template, &next.matter)
            .await?;
        if !report.score.is_finite() {
            return Err(NodeError::Invalid(format!(
                "quality analysis returned non-numeric score {}",
                report.score
            )));
        }
        let score = report.score.clamp(0.0, 100.0);
        if score != report.score {
            next.warnings.push(format!(
                "quality score {} clamped to {score}",
                report.score
            ));
        }

        next.usage.record(
            self.config.tiers.quality_analysis,
            estimate_tokens(&document, self.chars_per_token),
            &self.pricing,
        );
        next.quality_score = Some(score);
        next.quality_history.push(score);
        next.feedback = report.feedback;
        Ok(next)
    }

    pub(super) async fn refinement(&self, state: &PipelineState) -> NodeResult {
        let tier = self.config.tiers.refinement;
        let instruction = Instruction::Refine {
            feedback: state.feedback.clone(),
        };
        self.revise(state, PipelineNode::Refinement, instruction, tier)
            .await
    }

    pub(super) async fn final_refinement(&self, state: &PipelineState) -> NodeResult {
        let tier = self.config.tiers.final_refinement;
        let instruction = Instruction::FinalRefine {
            feedback: state.feedback.clone(),
        };
        self.revise(state, PipelineNode::FinalRefinement, instruction, tier)
            .await
    }

    /// Formatting only; no scoring and no model call.
    pub(super) async fn client_readiness(&self, state: &PipelineState) -> NodeResult {
        let mut next = state.clone();
        let document = next
            .current_document()
            .ok_or_else(|| NodeError::Invalid("no document to finalize".into()))?;
        next.final_document = Some(format_for_client(document, &next.template.name));
        Ok(next)
    }

    async fn revise(
        &self,
        state: &PipelineState,
        node: PipelineNode,
        instruction: Instruction,
        tier: ModelTier,
    ) -> NodeResult {
        let mut next = state.clone();
        let pending = action(&next, node, tier);
        let text = self.generate(&mut next, instruction, tier).await?;
        next.current_iteration += 1;
        next.refinement_history.push(RefinementAction {
            iteration: next.current_iteration,
            ..pending
        });
        next.refined_document = Some(text);
        Ok(next)
    }

    /// One generation call over the whole template, accounted in `state`.
    async fn generate(
        &self,
        state: &mut PipelineState,
        instruction: Instruction,
        tier: ModelTier,
    ) -> Result<String, NodeError> {
        let request = GenerationRequest {
            document_type: state.document_type,
            sections: &state.template.sections,
            matter: &state.matter,
            context: &state.context,
            instruction,
            current_draft: state.current_document(),
            tier,
        };
        let text = self.generator.generate(&request).await?;
        if text.trim().is_empty() {
            return Err(NodeError::Invalid(format!(
                "generator returned an empty document for {}",
                request.instruction.label()
            )));
        }

        let tokens = estimate_tokens(&request.prompt(), self.chars_per_token)
            + estimate_tokens(&text, self.chars_per_token);
        state.usage.record(tier, tokens, &self.pricing);
        Ok(text)
    }
}

fn action(state: &PipelineState, node: PipelineNode, tier: ModelTier) -> RefinementAction {
    RefinementAction {
        node,
        iteration: state.current_iteration,
        score_before: state.quality_score,
        feedback: state.feedback.clone(),
        tier,
        timestamp: Utc::now(),
    }
}

/// Tidy whitespace and make sure the document opens with a level-one title.
pub fn format_for_client(document: &str, template_name: &str) -> String {
    let body = polish(document);
    let starts_with_title = body
        .lines()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.starts_with("# "));
    if starts_with_title {
        return body;
    }

    let title = template_name
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("# {title}\n\n{body}")
}
