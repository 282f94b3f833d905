//! Collaborators that run entirely on the local machine: JSON matter files,
//! a deterministic template renderer, a structural scorer and file output.
//! They back the command line and make every pipeline path reproducible
//! without a model provider.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::collaborators::{
    GenerationRequest, Generator, Instruction, Intake, Persistence, QualityReport, QualityScorer,
    Retriever, SavedDocument,
};
use crate::config::BrieflowConfig;
use crate::document::{ContextBundle, DocumentType, MatterContext, Party, Section, Template};
use crate::drafting::worker::{heading_title, scan_headings, scan_placeholders};
use crate::error::CollaboratorError;
use crate::orchestrator::{Collaborators, JobOrchestrator};
use crate::pipeline::RefinementPipeline;
use crate::unit::AuditSink;

/// Matter file shape accepted by [`JsonFileIntake`].
#[derive(Debug, Deserialize)]
struct MatterFile {
    #[serde(default)]
    parties: Vec<Party>,
    #[serde(default)]
    fields: BTreeMap<String, serde_json::Value>,
}

/// Reads `{"parties": [...], "fields": {...}}` from the input path.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileIntake;

impl JsonFileIntake {
    /// Normalize already-loaded JSON.
    pub fn parse(
        contents: &str,
        document_type: DocumentType,
    ) -> Result<MatterContext, CollaboratorError> {
        let file: MatterFile = serde_json::from_str(contents)
            .map_err(|e| CollaboratorError::Intake(format!("malformed matter file: {e}")))?;

        let mut matter = MatterContext::new(document_type);
        for party in file.parties {
            let name = party.name.trim();
            if name.is_empty() {
                matter
                    .validation
                    .warnings
                    .push(format!("party '{}' has no name", party.role));
                continue;
            }
            matter = matter.with_party(party.role.trim(), name);
        }

        for (key, value) in file.fields {
            let text = match value {
                serde_json::Value::Null => {
                    matter
                        .validation
                        .warnings
                        .push(format!("field '{key}' is null and was skipped"));
                    continue;
                }
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            matter = matter.with_field(&key, &text);
        }

        if matter.party("client").is_none() {
            matter.validation.valid = false;
            matter
                .validation
                .errors
                .push("a party with role 'client' is required".into());
        }
        if matter.party("opposing_party").is_none() {
            matter
                .validation
                .warnings
                .push("no opposing_party given".into());
        }
        Ok(matter)
    }
}

#[async_trait]
impl Intake for JsonFileIntake {
    async fn normalize(
        &self,
        input: &str,
        document_type: DocumentType,
    ) -> Result<MatterContext, CollaboratorError> {
        let contents = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| CollaboratorError::Intake(format!("cannot read {input}: {e}")))?;
        Self::parse(&contents, document_type)
    }
}

/// Retrieval that always comes back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRetriever;

#[async_trait]
impl Retriever for NullRetriever {
    async fn retrieve(&self, _matter: &MatterContext) -> Result<ContextBundle, CollaboratorError> {
        Ok(ContextBundle::empty())
    }
}

/// Renders each requested section from its guidance and the matter fields.
/// Revisions restore any template section missing from the current draft.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    fn render_section(section: &Section, matter: &MatterContext, context: &ContextBundle) -> String {
        let client = matter.party("client").map_or("the client", |p| p.name.as_str());
        let opposing = matter
            .party("opposing_party")
            .map_or("the opposing party", |p| p.name.as_str());

        let mut body = format!(
            "## {}\n\n{}\n\nPrepared on behalf of {client} in this matter against {opposing}.",
            section.title, section.guidance
        );
        if !matter.normalized.is_empty() {
            let facts = matter
                .normalized
                .iter()
                .map(|(k, v)| format!("{} {v}", k.replace('_', " ")))
                .collect::<Vec<_>>()
                .join("; ");
            body.push_str(&format!(" Particulars on record: {facts}."));
        }
        if let Some(passage) = context.passages.first() {
            body.push_str(&format!(" See {}.", passage.source));
        }
        body.push_str(" Further particulars are set out in the accompanying record.\n");
        body
    }

    fn render(sections: &[Section], matter: &MatterContext, context: &ContextBundle) -> String {
        sections
            .iter()
            .map(|s| Self::render_section(s, matter, context))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn complete(draft: &str, request: &GenerationRequest<'_>) -> String {
        let present: Vec<String> = scan_headings(draft)
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        let missing: Vec<Section> = request
            .sections
            .iter()
            .filter(|s| !present.contains(&s.title.to_lowercase()))
            .cloned()
            .collect();

        let mut text = draft.trim_end().to_string();
        for placeholder in scan_placeholders(&text) {
            text = text.replace(&placeholder, "[to be confirmed]");
        }
        if !missing.is_empty() {
            text.push_str("\n\n");
            text.push_str(&Self::render(&missing, request.matter, request.context));
        }
        text.push('\n');
        text
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        match (&request.instruction, request.current_draft) {
            (Instruction::Draft, _) | (_, None) => Ok(Self::render(
                request.sections,
                request.matter,
                request.context,
            )),
            (Instruction::Polish, Some(draft)) => Ok(draft.to_string()),
            (Instruction::Refine { .. } | Instruction::FinalRefine { .. }, Some(draft)) => {
                Ok(Self::complete(draft, request))
            }
        }
    }
}

/// Scores structure only: section coverage, section depth and unresolved
/// placeholders.
#[derive(Debug, Clone, Copy)]
pub struct StructuralScorer {
    /// Words a section body needs to count as developed.
    pub min_section_words: usize,
}

impl Default for StructuralScorer {
    fn default() -> Self {
        Self {
            min_section_words: 20,
        }
    }
}

/// `(normalized title, word count)` for each heading in `text`.
fn section_word_counts(text: &str) -> Vec<(String, usize)> {
    let mut sections: Vec<(String, usize)> = Vec::new();
    for line in text.lines() {
        match heading_title(line) {
            Some(title) => sections.push((title.to_lowercase(), 0)),
            None => {
                if let Some(last) = sections.last_mut() {
                    last.1 += line.split_whitespace().count();
                }
            }
        }
    }
    sections
}

#[async_trait]
impl QualityScorer for StructuralScorer {
    async fn analyze(
        &self,
        document: &str,
        template: &Template,
        _matter: &MatterContext,
    ) -> Result<QualityReport, CollaboratorError> {
        if template.sections.is_empty() {
            return Err(CollaboratorError::Scoring("template has no sections".into()));
        }

        let found = section_word_counts(document);
        let total = template.sections.len() as f64;
        let mut feedback = Vec::new();
        let mut present = 0usize;
        let mut developed = 0usize;

        for section in &template.sections {
            let title = section.title.to_lowercase();
            match found.iter().find(|(t, _)| *t == title) {
                Some((_, words)) => {
                    present += 1;
                    if *words >= self.min_section_words {
                        developed += 1;
                    } else {
                        feedback.push(format!("expand section '{}'", section.title));
                    }
                }
                None => feedback.push(format!("add missing section '{}'", section.title)),
            }
        }

        let placeholders = scan_placeholders(document);
        for token in &placeholders {
            feedback.push(format!("resolve placeholder {token}"));
        }

        let coverage = present as f64 / total * 70.0;
        let depth = developed as f64 / total * 30.0;
        let penalty = (placeholders.len() as f64 * 10.0).min(30.0);
        let score = (coverage + depth - penalty).clamp(0.0, 100.0);

        Ok(QualityReport { score, feedback })
    }
}

/// Writes documents to the local filesystem, creating parent directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePersistence;

#[async_trait]
impl Persistence for FilePersistence {
    async fn save(
        &self,
        document: &str,
        destination: &str,
    ) -> Result<SavedDocument, CollaboratorError> {
        let path = Path::new(destination);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollaboratorError::Persistence(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, document)
            .await
            .map_err(|e| CollaboratorError::Persistence(format!("{destination}: {e}")))?;
        Ok(SavedDocument {
            path: destination.to_string(),
            size: document.len() as u64,
        })
    }
}

/// A fully offline orchestrator with the refinement pipeline attached.
pub fn orchestrator(config: &BrieflowConfig, sink: Arc<dyn AuditSink>) -> JobOrchestrator {
    let generator: Arc<dyn Generator> = Arc::new(TemplateGenerator);
    let collaborators = Collaborators {
        intake: Arc::new(JsonFileIntake),
        retriever: Arc::new(NullRetriever),
        generator: Arc::clone(&generator),
        persistence: Arc::new(FilePersistence),
    };
    let pipeline =
        RefinementPipeline::new(generator, Arc::new(StructuralScorer::default()), config);
    JobOrchestrator::new(collaborators, config.drafting.clone(), sink)
        .with_pricing(config.pricing.clone())
        .with_pipeline(pipeline)
}

/// Matter used by `brieflow demo`.
pub const SAMPLE_MATTER: &str = r#"{
  "parties": [
    { "role": "client", "name": "Harbor Freight Logistics LLC" },
    { "role": "opposing_party", "name": "Northwind Storage Inc." }
  ],
  "fields": {
    "amount": 48250,
    "incident_date": "2026-03-14",
    "invoice_numbers": "NW-1182, NW-1190",
    "payment_deadline": "30 days"
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ModelTier;

    fn matter() -> MatterContext {
        JsonFileIntake::parse(SAMPLE_MATTER, DocumentType::DemandLetter).unwrap()
    }

    #[test]
    fn sample_matter_parses_and_validates() {
        let matter = matter();
        assert!(matter.validation.valid);
        assert_eq!(
            matter.party("client").map(|p| p.name.as_str()),
            Some("Harbor Freight Logistics LLC")
        );
        assert_eq!(matter.value("amount"), Some("48250"));
        assert_eq!(matter.value("incident_date"), Some("2026-03-14"));
    }

    #[test]
    fn missing_client_is_invalid() {
        let matter =
            JsonFileIntake::parse(r#"{"fields": {"amount": null}}"#, DocumentType::Motion).unwrap();
        assert!(!matter.validation.valid);
        assert!(matter.validation.errors[0].contains("client"));
        assert_eq!(matter.validation.warnings.len(), 2);
    }

    #[test]
    fn malformed_json_is_an_intake_error() {
        let err = JsonFileIntake::parse("{not json", DocumentType::Motion).unwrap_err();
        assert!(matches!(err, CollaboratorError::Intake(_)));
    }

    #[tokio::test]
    async fn intake_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matter.json");
        std::fs::write(&path, SAMPLE_MATTER).unwrap();

        let matter = JsonFileIntake
            .normalize(path.to_str().unwrap(), DocumentType::Complaint)
            .await
            .unwrap();
        assert_eq!(matter.document_type, DocumentType::Complaint);

        let missing = JsonFileIntake
            .normalize("/nonexistent/matter.json", DocumentType::Complaint)
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn rendered_template_scores_full_marks() {
        let template = Template::builtin(DocumentType::DemandLetter);
        let matter = matter();
        let context = ContextBundle::empty();
        let request = GenerationRequest {
            document_type: template.document_type,
            sections: &template.sections,
            matter: &matter,
            context: &context,
            instruction: Instruction::Draft,
            current_draft: None,
            tier: ModelTier::Sonnet,
        };
        let text = TemplateGenerator.generate(&request).await.unwrap();
        assert_eq!(scan_headings(&text).len(), template.sections.len());
        assert!(text.contains("Northwind Storage Inc."));

        let report = StructuralScorer::default()
            .analyze(&text, &template, &matter)
            .await
            .unwrap();
        assert_eq!(report.score, 100.0);
        assert!(report.feedback.is_empty());
    }

    #[tokio::test]
    async fn refinement_restores_missing_sections() {
        let template = Template::builtin(DocumentType::LegalMemo);
        let matter = MatterContext::new(DocumentType::LegalMemo).with_party("client", "Acme");
        let context = ContextBundle::empty();
        let partial = "## Question Presented\n\nIs {{issue}} actionable?\n";

        let scorer = StructuralScorer::default();
        let before = scorer.analyze(partial, &template, &matter).await.unwrap();
        assert!(before.score < 80.0);
        assert!(before.feedback.iter().any(|f| f.contains("Short Answer")));

        let request = GenerationRequest {
            document_type: template.document_type,
            sections: &template.sections,
            matter: &matter,
            context: &context,
            instruction: Instruction::Refine {
                feedback: before.feedback.clone(),
            },
            current_draft: Some(partial),
            tier: ModelTier::Sonnet,
        };
        let refined = TemplateGenerator.generate(&request).await.unwrap();
        assert!(scan_placeholders(&refined).is_empty());
        assert_eq!(scan_headings(&refined).len(), template.sections.len());

        let after = scorer.analyze(&refined, &template, &matter).await.unwrap();
        assert!(after.score > before.score);
    }

    #[tokio::test]
    async fn offline_job_end_to_end() {
        use crate::orchestrator::JobConfig;
        use crate::pipeline::CompletionStatus;
        use crate::unit::NullAuditSink;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("matter.json");
        let output = dir.path().join("letter.md");
        std::fs::write(&input, SAMPLE_MATTER).unwrap();

        let job = JobConfig::new(
            "demand-letter",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
        );
        let report = orchestrator(&BrieflowConfig::default(), Arc::new(NullAuditSink))
            .run_job(&job)
            .await;

        assert!(report.is_success(), "{:?}", report.failure());
        let summary = report.metadata.refinement.as_ref().unwrap();
        assert_eq!(summary.status, CompletionStatus::FinalApproved);
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("# Demand Letter\n"));
        assert_eq!(Some(written.as_str()), report.document());
    }

    #[tokio::test]
    async fn file_persistence_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/letter.md");
        let saved = FilePersistence
            .save("# Letter\n", target.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(saved.size, 9);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Letter\n");
    }
}
