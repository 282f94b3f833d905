use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::splitter::Task;
use crate::collaborators::{GenerationRequest, Generator, Instruction};
use crate::error::UnitError;
use crate::router::{ModelSelector, ModelTier};
use crate::unit::{AuditHash, AuditHasher, Checkpoint, UnitOfWork};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid regex"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid regex"));

/// Heading text of a markdown line, if it is one.
pub fn heading_title(line: &str) -> Option<&str> {
    HEADING
        .captures(line)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Every heading title in document order.
pub fn scan_headings(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(heading_title)
        .map(str::to_string)
        .collect()
}

/// Unresolved `{{placeholder}}` tokens, first occurrence order, no repeats.
pub fn scan_placeholders(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        let token = caps[0].to_string();
        if !found.contains(&token) {
            found.push(token);
        }
    }
    found
}

pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count() / chars_per_token.max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftMetadata {
    pub sections_generated: Vec<String>,
    pub placeholders_remaining: Vec<String>,
    pub estimated_tokens: usize,
    pub generation_passes: u32,
    pub tier: ModelTier,
}

/// Text produced by one worker for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDraft {
    pub sequence: usize,
    /// Template section ids this draft was assigned.
    pub section_ids: Vec<String>,
    pub text: String,
    pub metadata: DraftMetadata,
}

impl AuditHash for PartialDraft {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("partial_draft").u64(self.sequence as u64);
        self.section_ids.write_audit(hasher);
        hasher.str(&self.text);
        self.metadata.sections_generated.write_audit(hasher);
        self.metadata.placeholders_remaining.write_audit(hasher);
        hasher
            .u64(self.metadata.estimated_tokens as u64)
            .u64(u64::from(self.metadata.generation_passes))
            .str(self.metadata.tier.as_str());
    }
}

/// Drafts the sections of one task with a single generation call.
pub struct DraftingWorker {
    generator: Arc<dyn Generator>,
    min_draft_chars: usize,
    chars_per_token: usize,
    tier_override: Option<ModelTier>,
}

impl DraftingWorker {
    pub fn new(generator: Arc<dyn Generator>, min_draft_chars: usize, chars_per_token: usize) -> Self {
        Self {
            generator,
            min_draft_chars,
            chars_per_token,
            tier_override: None,
        }
    }

    /// Bypass [`ModelSelector`] and always use `tier`.
    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier_override = Some(tier);
        self
    }
}

#[async_trait]
impl UnitOfWork for DraftingWorker {
    type Input = Task;
    type Output = PartialDraft;

    fn name(&self) -> &str {
        "drafting_worker"
    }

    fn pre_checks(&self, task: &Task) -> Vec<Checkpoint> {
        vec![
            Checkpoint::check("sections_assigned", !task.sections.is_empty(), || {
                format!("task {} has no sections", task.sequence)
            }),
            Checkpoint::check(
                "matter_matches_document",
                task.matter.document_type == task.document_type,
                || {
                    format!(
                        "matter is for {} but task drafts {}",
                        task.matter.document_type, task.document_type
                    )
                },
            ),
            Checkpoint::check("matter_valid", task.matter.validation.valid, || {
                task.matter.validation.errors.join("; ")
            }),
        ]
    }

    async fn execute(&self, task: &Task) -> Result<PartialDraft, UnitError> {
        let tier = self
            .tier_override
            .unwrap_or_else(|| ModelSelector::select(&task.sections));
        let request = GenerationRequest {
            document_type: task.document_type,
            sections: &task.sections,
            matter: &task.matter,
            context: &task.context,
            instruction: Instruction::Draft,
            current_draft: None,
            tier,
        };

        tracing::debug!(
            sequence = task.sequence,
            sections = task.sections.len(),
            %tier,
            "requesting draft"
        );

        let text = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| UnitError::Processing {
                unit: self.name().to_string(),
                cause: e.to_string(),
            })?;

        let metadata = DraftMetadata {
            sections_generated: scan_headings(&text),
            placeholders_remaining: scan_placeholders(&text),
            estimated_tokens: estimate_tokens(&text, self.chars_per_token),
            generation_passes: 1,
            tier,
        };

        Ok(PartialDraft {
            sequence: task.sequence,
            section_ids: task.section_ids(),
            text,
            metadata,
        })
    }

    fn post_checks(&self, _task: &Task, draft: &PartialDraft) -> Vec<Checkpoint> {
        let chars = draft.text.trim().chars().count();
        vec![
            Checkpoint::check(
                "no_placeholders",
                draft.metadata.placeholders_remaining.is_empty(),
                || {
                    format!(
                        "unresolved placeholders: {}",
                        draft.metadata.placeholders_remaining.join(", ")
                    )
                },
            ),
            Checkpoint::check("minimum_length", chars >= self.min_draft_chars, || {
                format!(
                    "draft has {chars} characters, expected at least {}",
                    self.min_draft_chars
                )
            }),
        ]
    }
}
