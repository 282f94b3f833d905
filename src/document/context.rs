use serde::{Deserialize, Serialize};

use crate::unit::{AuditHash, AuditHasher};

/// One retrieved supporting passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub source: String,
    pub text: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub search_terms: Vec<String>,
    pub similarity_threshold: f64,
    pub result_count: usize,
    pub total_tokens: usize,
}

/// Supporting precedent text for grounding generation. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub passages: Vec<Passage>,
    pub query: QueryMetadata,
}

impl ContextBundle {
    /// The well-formed bundle substituted when retrieval fails or is skipped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bundle, deriving `result_count` and `total_tokens` from the
    /// passages themselves.
    pub fn from_passages(
        passages: Vec<Passage>,
        search_terms: Vec<String>,
        similarity_threshold: f64,
        chars_per_token: usize,
    ) -> Self {
        let chars: usize = passages.iter().map(|p| p.text.chars().count()).sum();
        let query = QueryMetadata {
            search_terms,
            similarity_threshold,
            result_count: passages.len(),
            total_tokens: chars / chars_per_token.max(1),
        };
        Self { passages, query }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl AuditHash for ContextBundle {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("context").u64(self.passages.len() as u64);
        for passage in &self.passages {
            hasher
                .str(&passage.source)
                .str(&passage.text)
                .f64(passage.similarity);
        }
        self.query.search_terms.write_audit(hasher);
        hasher
            .f64(self.query.similarity_threshold)
            .u64(self.query.result_count as u64)
            .u64(self.query.total_tokens as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_is_well_formed() {
        let bundle = ContextBundle::empty();
        assert!(bundle.is_empty());
        assert_eq!(bundle.query.result_count, 0);
        assert_eq!(bundle.query.total_tokens, 0);
    }

    #[test]
    fn from_passages_derives_counts() {
        let bundle = ContextBundle::from_passages(
            vec![
                Passage {
                    source: "smith-v-jones".into(),
                    text: "a".repeat(40),
                    similarity: 0.91,
                },
                Passage {
                    source: "doe-v-roe".into(),
                    text: "b".repeat(20),
                    similarity: 0.84,
                },
            ],
            vec!["negligence".into()],
            0.8,
            4,
        );
        assert_eq!(bundle.query.result_count, 2);
        assert_eq!(bundle.query.total_tokens, 15);
    }
}
