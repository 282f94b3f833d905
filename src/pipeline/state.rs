use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usage::ResourceUsage;
use crate::document::{ContextBundle, DocumentType, MatterContext, Template};
use crate::error::ErrorKind;
use crate::router::ModelTier;

/// Nodes of the refinement pipeline.
///
/// A first pass runs CONTEXT_ASSEMBLY → DOCUMENT_GENERATION →
/// BASIC_REFINEMENT → QUALITY_ANALYSIS; the gates then loop through
/// REFINEMENT / FINAL_REFINEMENT or exit via CLIENT_READINESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineNode {
    ContextAssembly,
    DocumentGeneration,
    BasicRefinement,
    QualityAnalysis,
    Refinement,
    FinalRefinement,
    ClientReadiness,
}

impl fmt::Display for PipelineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineNode::ContextAssembly => write!(f, "CONTEXT_ASSEMBLY"),
            PipelineNode::DocumentGeneration => write!(f, "DOCUMENT_GENERATION"),
            PipelineNode::BasicRefinement => write!(f, "BASIC_REFINEMENT"),
            PipelineNode::QualityAnalysis => write!(f, "QUALITY_ANALYSIS"),
            PipelineNode::Refinement => write!(f, "REFINEMENT"),
            PipelineNode::FinalRefinement => write!(f, "FINAL_REFINEMENT"),
            PipelineNode::ClientReadiness => write!(f, "CLIENT_READINESS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    InProgress,
    /// Passed the quality gate but never reached the final gate in budget.
    QualityApproved,
    FinalApproved,
    /// Iterations exhausted below the quality gate.
    Unresolved,
    Failed,
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::InProgress => write!(f, "in progress"),
            CompletionStatus::QualityApproved => write!(f, "quality approved"),
            CompletionStatus::FinalApproved => write!(f, "final approved"),
            CompletionStatus::Unresolved => write!(f, "max iterations, unresolved"),
            CompletionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementAction {
    pub node: PipelineNode,
    pub iteration: u32,
    pub score_before: Option<f64>,
    pub feedback: Vec<String>,
    pub tier: ModelTier,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineError {
    pub node: PipelineNode,
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
    pub timestamp: DateTime<Utc>,
}

/// The record threaded through every pipeline node. Nodes receive the
/// previous state and return a new one; a job's state is never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub document_type: DocumentType,
    pub template: Template,
    pub matter: MatterContext,
    pub context: ContextBundle,

    /// Refinement passes performed so far; never exceeds `max_iterations`.
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub quality_history: Vec<f64>,
    pub refinement_history: Vec<RefinementAction>,
    /// Feedback from the most recent quality analysis.
    pub feedback: Vec<String>,

    pub generated_document: Option<String>,
    pub refined_document: Option<String>,
    pub final_document: Option<String>,

    pub quality_score: Option<f64>,
    pub passed_quality_gate: bool,
    pub passed_final_gate: bool,
    pub status: CompletionStatus,

    pub usage: ResourceUsage,
    pub errors: Vec<PipelineError>,
    pub warnings: Vec<String>,
    /// Every node entered, in order.
    pub visited: Vec<PipelineNode>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    pub fn new(
        template: Template,
        matter: MatterContext,
        context: ContextBundle,
        max_iterations: u32,
    ) -> Self {
        Self {
            document_type: template.document_type,
            template,
            matter,
            context,
            current_iteration: 0,
            max_iterations,
            quality_history: Vec::new(),
            refinement_history: Vec::new(),
            feedback: Vec::new(),
            generated_document: None,
            refined_document: None,
            final_document: None,
            quality_score: None,
            passed_quality_gate: false,
            passed_final_gate: false,
            status: CompletionStatus::InProgress,
            usage: ResourceUsage::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            visited: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Seed the generation node with an existing draft.
    pub fn with_draft(mut self, draft: String) -> Self {
        self.generated_document = Some(draft);
        self
    }

    /// The latest working text: refined if any refinement ran, else generated.
    pub fn current_document(&self) -> Option<&str> {
        self.refined_document
            .as_deref()
            .or(self.generated_document.as_deref())
    }

    pub fn iterations_remain(&self) -> bool {
        self.current_iteration < self.max_iterations
    }

    pub fn is_terminal(&self) -> bool {
        self.status != CompletionStatus::InProgress
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            status: self.status,
            quality_score: self.quality_score,
            iterations: self.current_iteration,
            max_iterations: self.max_iterations,
            quality_history: self.quality_history.clone(),
            passed_quality_gate: self.passed_quality_gate,
            passed_final_gate: self.passed_final_gate,
            visited: self.visited.clone(),
            usage: self.usage.clone(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
            duration_ms: self
                .completed_at
                .map(|end| (end - self.started_at).num_milliseconds())
                .unwrap_or(0),
        }
    }
}

/// Telemetry handed back to the caller alongside the final document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub status: CompletionStatus,
    pub quality_score: Option<f64>,
    pub iterations: u32,
    pub max_iterations: u32,
    pub quality_history: Vec<f64>,
    pub passed_quality_gate: bool,
    pub passed_final_gate: bool,
    pub visited: Vec<PipelineNode>,
    pub usage: ResourceUsage,
    pub warnings: Vec<String>,
    pub errors: Vec<PipelineError>,
    pub duration_ms: i64,
}
