use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Section;

/// Class of underlying generation model, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Haiku,
    Sonnet,
    Opus,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::Haiku, ModelTier::Sonnet, ModelTier::Opus];

    /// The premium tier every cost-saving estimate is measured against.
    pub const PREMIUM: ModelTier = ModelTier::Opus;

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Haiku => "haiku",
            ModelTier::Sonnet => "sonnet",
            ModelTier::Opus => "opus",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects a model tier for a drafting task from the complexity of its
/// sections, using weighted keyword scoring over titles and guidance.
pub struct ModelSelector;

impl ModelSelector {
    pub fn select(sections: &[Section]) -> ModelTier {
        let text = sections
            .iter()
            .map(|s| format!("{} {}", s.title, s.guidance))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let simple_keywords: &[(&str, u32)] = &[
            ("caption", 10),
            ("signature", 10),
            ("contact", 5),
            ("restate", 7),
            ("case number", 5),
            ("identify", 3),
        ];

        let complex_keywords: &[(&str, u32)] = &[
            ("argument", 10),
            ("analysis", 10),
            ("authority", 8),
            ("liability", 8),
            ("elements", 7),
            ("release", 5),
            ("calculated", 5),
        ];

        let mut simple_score: u32 = 0;
        let mut complex_score: u32 = 0;

        for &(keyword, weight) in simple_keywords {
            if text.contains(keyword) {
                simple_score += weight;
            }
        }

        for &(keyword, weight) in complex_keywords {
            if text.contains(keyword) {
                complex_score += weight;
            }
        }

        // Many sections in one task is itself a sign of a heavy request.
        if sections.len() > 3 {
            complex_score += 5;
        }

        if simple_score > complex_score && simple_score >= 5 {
            ModelTier::Haiku
        } else if complex_score > simple_score && complex_score >= 10 {
            ModelTier::Opus
        } else {
            ModelTier::Sonnet
        }
    }
}
