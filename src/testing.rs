//! Mock collaborators shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{
    GenerationRequest, Generator, Instruction, Intake, Persistence, QualityReport, QualityScorer,
    Retriever, SavedDocument,
};
use crate::document::{ContextBundle, DocumentType, MatterContext, Template};
use crate::error::CollaboratorError;
use crate::router::ModelTier;
use crate::unit::{AgentLogEntry, AuditSink};

pub fn paragraph(title: &str) -> String {
    format!(
        "This section addresses {title} in full. It sets out the relevant facts, \
         applies the governing standard, and states the position of the client clearly."
    )
}

/// Renders `## Title` plus a paragraph per requested section. Revisions echo
/// the current draft back.
#[derive(Default)]
pub struct ScriptedGenerator {
    delays: HashMap<String, u64>,
    fail_on: Option<String>,
    placeholder: Option<String>,
    full_template: Option<Template>,
    log: Mutex<Vec<(String, ModelTier)>>,
    contexts: Mutex<Vec<ContextBundle>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering any request whose first section is `section_id`.
    pub fn with_delay(mut self, section_id: &str, millis: u64) -> Self {
        self.delays.insert(section_id.to_string(), millis);
        self
    }

    pub fn failing_on(mut self, section_id: &str) -> Self {
        self.fail_on = Some(section_id.to_string());
        self
    }

    pub fn with_placeholder(mut self, token: &str) -> Self {
        self.placeholder = Some(token.to_string());
        self
    }

    /// Ignore the assigned slice and emit every section of `template`.
    pub fn emitting_full(mut self, template: Template) -> Self {
        self.full_template = Some(template);
        self
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn tiers(&self) -> Vec<ModelTier> {
        self.log.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// The context bundle handed to each call, in call order.
    pub fn contexts(&self) -> Vec<ContextBundle> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn instructions(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(i, _)| i.clone())
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        self.log
            .lock()
            .unwrap()
            .push((request.instruction.label().to_string(), request.tier));
        self.contexts.lock().unwrap().push(request.context.clone());

        if let Some(first) = request.sections.first() {
            if let Some(ms) = self.delays.get(&first.id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }

        if let Some(fail) = &self.fail_on {
            if request.sections.iter().any(|s| &s.id == fail) {
                return Err(CollaboratorError::Generation(format!(
                    "refused to draft {fail}"
                )));
            }
        }

        if request.instruction != Instruction::Draft {
            return Ok(request.current_draft.unwrap_or_default().to_string());
        }

        let sections = match &self.full_template {
            Some(template) => template.sections.as_slice(),
            None => request.sections,
        };
        let mut text = String::new();
        for section in sections {
            text.push_str(&format!("## {}\n\n{}\n\n", section.title, paragraph(&section.title)));
        }
        if let Some(token) = &self.placeholder {
            text.push_str(&format!("Respond by {token}.\n"));
        }
        Ok(text)
    }
}

pub struct FailingGenerator(pub CollaboratorError);

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        Err(self.0.clone())
    }
}

pub struct StaticIntake(pub Result<MatterContext, CollaboratorError>);

impl StaticIntake {
    pub fn ok(document_type: DocumentType) -> Self {
        Self(Ok(MatterContext::new(document_type)
            .with_party("client", "Acme Corp")
            .with_party("opposing_party", "Globex LLC")
            .with_field("amount", "12500")))
    }
}

#[async_trait]
impl Intake for StaticIntake {
    async fn normalize(
        &self,
        _input: &str,
        _document_type: DocumentType,
    ) -> Result<MatterContext, CollaboratorError> {
        self.0.clone()
    }
}

pub struct StaticRetriever(pub Result<ContextBundle, CollaboratorError>);

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _matter: &MatterContext) -> Result<ContextBundle, CollaboratorError> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct MemoryPersistence {
    pub saved: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn save(
        &self,
        document: &str,
        destination: &str,
    ) -> Result<SavedDocument, CollaboratorError> {
        self.saved
            .lock()
            .unwrap()
            .push((destination.to_string(), document.to_string()));
        Ok(SavedDocument {
            path: destination.to_string(),
            size: document.len() as u64,
        })
    }
}

/// Returns queued scores in order; the last one repeats once the queue drains.
pub struct ScriptedScorer {
    scores: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    calls: Mutex<usize>,
}

impl ScriptedScorer {
    pub fn new(scores: &[f64]) -> Self {
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            last: Mutex::new(scores.last().copied().unwrap_or(0.0)),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl QualityScorer for ScriptedScorer {
    async fn analyze(
        &self,
        _document: &str,
        _template: &Template,
        _matter: &MatterContext,
    ) -> Result<QualityReport, CollaboratorError> {
        *self.calls.lock().unwrap() += 1;
        let score = self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.last.lock().unwrap());
        let feedback = if score < 90.0 {
            vec![format!("score {score}: tighten the argument")]
        } else {
            Vec::new()
        };
        Ok(QualityReport { score, feedback })
    }
}

pub struct FailingScorer;

#[async_trait]
impl QualityScorer for FailingScorer {
    async fn analyze(
        &self,
        _document: &str,
        _template: &Template,
        _matter: &MatterContext,
    ) -> Result<QualityReport, CollaboratorError> {
        Err(CollaboratorError::Scoring("analysis model crashed".into()))
    }
}

pub struct PanickingScorer;

#[async_trait]
impl QualityScorer for PanickingScorer {
    async fn analyze(
        &self,
        _document: &str,
        _template: &Template,
        _matter: &MatterContext,
    ) -> Result<QualityReport, CollaboratorError> {
        panic!("scorer blew up")
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    pub entries: Mutex<Vec<AgentLogEntry>>,
}

impl MemoryAuditSink {
    pub fn units(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.unit.clone())
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AgentLogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
