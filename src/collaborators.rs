//! Narrow interfaces to the services the core consumes but does not own:
//! intake, retrieval, text generation, quality analysis and persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{ContextBundle, DocumentType, MatterContext, Section, Template};
use crate::error::CollaboratorError;
use crate::router::ModelTier;

/// Turns a raw input reference into a normalized matter context.
#[async_trait]
pub trait Intake: Send + Sync {
    async fn normalize(
        &self,
        input: &str,
        document_type: DocumentType,
    ) -> Result<MatterContext, CollaboratorError>;
}

/// Best-effort similarity retrieval of supporting passages.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, matter: &MatterContext) -> Result<ContextBundle, CollaboratorError>;
}

/// What the generator is being asked to do with the sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Produce the sections from scratch.
    Draft,
    /// Light clean-up of an existing draft.
    Polish,
    /// Address quality feedback on an existing draft.
    Refine { feedback: Vec<String> },
    /// Last pass aimed at the final gate.
    FinalRefine { feedback: Vec<String> },
}

impl Instruction {
    pub fn label(&self) -> &'static str {
        match self {
            Instruction::Draft => "draft",
            Instruction::Polish => "polish",
            Instruction::Refine { .. } => "refine",
            Instruction::FinalRefine { .. } => "final_refine",
        }
    }
}

/// Describe the desired sections; receive markdown back.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub document_type: DocumentType,
    pub sections: &'a [Section],
    pub matter: &'a MatterContext,
    pub context: &'a ContextBundle,
    pub instruction: Instruction,
    /// The draft being revised, for every instruction except `Draft`.
    pub current_draft: Option<&'a str>,
    pub tier: ModelTier,
}

impl GenerationRequest<'_> {
    /// Render the request as a single prompt message.
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "You are drafting a {} ({}). Respond with markdown only, one `## ` heading per section, \
             in the order given. Do not leave `{{{{placeholder}}}}` tokens.\n\n",
            self.document_type,
            self.instruction.label()
        );

        prompt.push_str("Sections:\n");
        for section in self.sections {
            prompt.push_str(&format!("- {}: {}\n", section.title, section.guidance));
        }

        if !self.matter.parties.is_empty() {
            prompt.push_str("\nParties:\n");
            for party in &self.matter.parties {
                prompt.push_str(&format!("- {}: {}\n", party.role, party.name));
            }
        }

        if !self.matter.normalized.is_empty() {
            prompt.push_str("\nMatter fields:\n");
            for (key, value) in &self.matter.normalized {
                prompt.push_str(&format!("- {key}: {value}\n"));
            }
        }

        if !self.context.is_empty() {
            prompt.push_str("\nSupporting precedent:\n");
            for passage in &self.context.passages {
                prompt.push_str(&format!("[{}] {}\n", passage.source, passage.text));
            }
        }

        match &self.instruction {
            Instruction::Refine { feedback } | Instruction::FinalRefine { feedback }
                if !feedback.is_empty() =>
            {
                prompt.push_str("\nAddress this feedback:\n");
                for item in feedback {
                    prompt.push_str(&format!("- {item}\n"));
                }
            }
            _ => {}
        }

        if let Some(draft) = self.current_draft {
            prompt.push_str("\nCurrent draft:\n");
            prompt.push_str(draft);
            prompt.push('\n');
        }

        prompt
    }
}

/// The remote text-generation provider.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError>;
}

/// Score (0–100) and structured feedback for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: f64,
    #[serde(default)]
    pub feedback: Vec<String>,
}

/// External quality analysis. The core routes on the score; it never
/// computes one.
#[async_trait]
pub trait QualityScorer: Send + Sync {
    async fn analyze(
        &self,
        document: &str,
        template: &Template,
        matter: &MatterContext,
    ) -> Result<QualityReport, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDocument {
    pub path: String,
    pub size: u64,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save(&self, document: &str, destination: &str)
    -> Result<SavedDocument, CollaboratorError>;
}
