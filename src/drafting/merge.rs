//! Fan-in: order partial drafts canonically, concatenate, drop repeated
//! sections, tidy whitespace.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::worker::{PartialDraft, heading_title};
use crate::document::Template;
use crate::error::UnitError;
use crate::unit::{AuditHash, AuditHasher, Checkpoint, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub text: String,
    /// Number of repeated sections removed.
    pub duplicates_removed: usize,
}

impl AuditHash for MergedDocument {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher
            .tag("merged_document")
            .str(&self.text)
            .u64(self.duplicates_removed as u64);
    }
}

/// Sort drafts by the canonical position of their first assigned section,
/// then by assignment sequence. Completion order is irrelevant.
pub fn order_drafts(template: &Template, mut drafts: Vec<PartialDraft>) -> Vec<PartialDraft> {
    drafts.sort_by_key(|draft| {
        let first = draft
            .section_ids
            .iter()
            .filter_map(|id| template.position(id))
            .min()
            .unwrap_or(usize::MAX);
        (first, draft.sequence)
    });
    drafts
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keep the first occurrence of every heading title. A repeated heading and
/// all lines after it are dropped until the next heading whose title has not
/// been seen. Headings inside fenced code blocks are ignored.
pub fn deduplicate_sections(text: &str) -> (String, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;
    let mut in_fence = false;
    let mut removed = 0;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }

        let title = if in_fence { None } else { heading_title(line) };
        if let Some(title) = title {
            if seen.insert(normalize_title(title)) {
                skipping = false;
            } else {
                skipping = true;
                removed += 1;
            }
        }

        if !skipping {
            kept.push(line);
        }
    }

    (kept.join("\n"), removed)
}

/// Trim trailing whitespace, collapse runs of blank lines, end with one
/// newline.
pub fn polish(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = true;
    for line in text.lines() {
        let line = line.trim_end();
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push(line);
        previous_blank = blank;
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let mut result = out.join("\n");
    result.push('\n');
    result
}

pub fn merge(template: &Template, drafts: Vec<PartialDraft>) -> MergedDocument {
    let ordered = order_drafts(template, drafts);
    let concatenated = ordered
        .iter()
        .map(|d| d.text.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n");
    let (deduplicated, duplicates_removed) = deduplicate_sections(&concatenated);
    MergedDocument {
        text: polish(&deduplicated),
        duplicates_removed,
    }
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub template: Template,
    pub drafts: Vec<PartialDraft>,
}

impl AuditHash for MergeRequest {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("merge_request");
        self.template.write_audit(hasher);
        self.drafts.write_audit(hasher);
    }
}

/// [`merge`] wrapped as an auditable unit.
#[derive(Debug, Default)]
pub struct MergeStage;

#[async_trait]
impl UnitOfWork for MergeStage {
    type Input = MergeRequest;
    type Output = MergedDocument;

    fn name(&self) -> &str {
        "merge_polish"
    }

    fn pre_checks(&self, input: &MergeRequest) -> Vec<Checkpoint> {
        let mut seen = HashSet::new();
        let mut overlap = None;
        let mut unknown = None;
        for id in input.drafts.iter().flat_map(|d| d.section_ids.iter()) {
            if input.template.position(id).is_none() {
                unknown.get_or_insert_with(|| id.clone());
            }
            if !seen.insert(id.as_str()) {
                overlap.get_or_insert_with(|| id.clone());
            }
        }

        vec![
            Checkpoint::check("drafts_present", !input.drafts.is_empty(), || {
                "no partial drafts to merge".into()
            }),
            Checkpoint::check("sections_in_template", unknown.is_none(), || {
                format!("section '{}' is not in the template", unknown.clone().unwrap_or_default())
            }),
            Checkpoint::check("sections_disjoint", overlap.is_none(), || {
                format!("section '{}' assigned twice", overlap.clone().unwrap_or_default())
            }),
        ]
    }

    async fn execute(&self, input: &MergeRequest) -> Result<MergedDocument, UnitError> {
        let merged = merge(&input.template, input.drafts.clone());
        if merged.duplicates_removed > 0 {
            tracing::info!(
                duplicates = merged.duplicates_removed,
                "removed repeated sections during merge"
            );
        }
        Ok(merged)
    }

    fn post_checks(&self, _input: &MergeRequest, output: &MergedDocument) -> Vec<Checkpoint> {
        vec![Checkpoint::check(
            "merged_not_empty",
            !output.text.trim().is_empty(),
            || "merged document is empty".into(),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, Section};
    use crate::drafting::worker::DraftMetadata;
    use crate::router::ModelTier;
    use crate::unit::process;

    fn abc() -> Template {
        Template::new(
            DocumentType::LegalMemo,
            "abc",
            vec![
                Section::new("alpha", "Alpha", ""),
                Section::new("beta", "Beta", ""),
                Section::new("gamma", "Gamma", ""),
            ],
        )
    }

    fn draft(sequence: usize, ids: &[&str], text: &str) -> PartialDraft {
        PartialDraft {
            sequence,
            section_ids: ids.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
            metadata: DraftMetadata {
                sections_generated: Vec::new(),
                placeholders_remaining: Vec::new(),
                estimated_tokens: 0,
                generation_passes: 1,
                tier: ModelTier::Sonnet,
            },
        }
    }

    #[test]
    fn merge_restores_canonical_order() {
        // Beta+Gamma finished before Alpha.
        let drafts = vec![
            draft(1, &["beta", "gamma"], "## Beta\nb text\n\n## Gamma\ng text\n"),
            draft(0, &["alpha"], "## Alpha\na text\n"),
        ];
        let merged = merge(&abc(), drafts);
        assert_eq!(
            merged.text,
            "## Alpha\na text\n\n## Beta\nb text\n\n## Gamma\ng text\n"
        );
        assert_eq!(merged.duplicates_removed, 0);
    }

    #[test]
    fn ordering_ignores_sequence_when_positions_differ() {
        let drafts = vec![
            draft(0, &["gamma"], "## Gamma\n"),
            draft(1, &["alpha"], "## Alpha\n"),
        ];
        let ordered = order_drafts(&abc(), drafts);
        assert_eq!(ordered[0].section_ids, vec!["alpha"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_its_content() {
        let text = "## Alpha\nfirst alpha\n## Beta\nbeta\n## Alpha\nsecond alpha\nmore\n## Gamma\ngamma";
        let (out, removed) = deduplicate_sections(text);
        assert_eq!(out, "## Alpha\nfirst alpha\n## Beta\nbeta\n## Gamma\ngamma");
        assert_eq!(removed, 1);
    }

    #[test]
    fn dedup_skips_through_consecutive_repeats() {
        let text = "## Alpha\na\n## Beta\nb\n## Alpha\nx\n## Beta\ny\n## Gamma\ng";
        let (out, removed) = deduplicate_sections(text);
        assert_eq!(out, "## Alpha\na\n## Beta\nb\n## Gamma\ng");
        assert_eq!(removed, 2);
    }

    #[test]
    fn dedup_matches_titles_case_and_space_insensitively() {
        let text = "## Statement of Facts\none\n# statement  of   FACTS\ntwo";
        let (out, removed) = deduplicate_sections(text);
        assert_eq!(out, "## Statement of Facts\none");
        assert_eq!(removed, 1);
    }

    #[test]
    fn dedup_ignores_headings_in_code_fences() {
        let text = "## Alpha\n```\n## Alpha\n```\n## Beta\nb";
        let (out, removed) = deduplicate_sections(text);
        assert_eq!(out, text);
        assert_eq!(removed, 0);
    }

    #[test]
    fn fully_duplicate_worker_output_collapses() {
        let drafts = vec![
            draft(0, &["alpha"], "## Alpha\na\n## Beta\nb\n## Gamma\ng"),
            draft(1, &["beta", "gamma"], "## Beta\nb2\n## Gamma\ng2"),
        ];
        let merged = merge(&abc(), drafts);
        assert_eq!(merged.text, "## Alpha\na\n## Beta\nb\n## Gamma\ng\n");
        assert_eq!(merged.duplicates_removed, 2);
    }

    #[test]
    fn polish_collapses_blank_runs() {
        assert_eq!(polish("\n\n# A  \n\n\n\ntext\t\n\n"), "# A\n\ntext\n");
    }

    #[tokio::test]
    async fn merge_stage_rejects_overlapping_drafts() {
        let request = MergeRequest {
            template: abc(),
            drafts: vec![
                draft(0, &["alpha", "beta"], "## Alpha\n## Beta"),
                draft(1, &["beta"], "## Beta"),
            ],
        };
        let err = process(&MergeStage, Some(&request)).await.unwrap_err();
        assert!(err.error.to_string().contains("sections_disjoint"));
    }

    #[tokio::test]
    async fn merge_stage_rejects_unknown_sections() {
        let request = MergeRequest {
            template: abc(),
            drafts: vec![draft(0, &["delta"], "## Delta")],
        };
        let err = process(&MergeStage, Some(&request)).await.unwrap_err();
        assert!(err.error.to_string().contains("sections_in_template"));
    }

    #[tokio::test]
    async fn merge_stage_logs_success() {
        let request = MergeRequest {
            template: abc(),
            drafts: vec![draft(0, &["alpha", "beta", "gamma"], "## Alpha\n## Beta\n## Gamma")],
        };
        let ok = process(&MergeStage, Some(&request)).await.unwrap();
        assert_eq!(ok.log_entry.unit, "merge_polish");
        assert_eq!(ok.checkpoints.len(), 4);
    }
}
