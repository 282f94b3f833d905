use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::{AuditHash, AuditHasher};

/// The closed set of document templates the system can draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DemandLetter,
    Motion,
    Complaint,
    SettlementAgreement,
    LegalMemo,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::DemandLetter,
        DocumentType::Motion,
        DocumentType::Complaint,
        DocumentType::SettlementAgreement,
        DocumentType::LegalMemo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::DemandLetter => "demand_letter",
            DocumentType::Motion => "motion",
            DocumentType::Complaint => "complaint",
            DocumentType::SettlementAgreement => "settlement_agreement",
            DocumentType::LegalMemo => "legal_memo",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported document type '{0}'")]
pub struct UnknownDocumentType(pub String);

impl FromStr for DocumentType {
    type Err = UnknownDocumentType;

    /// Accepts snake_case or kebab-case, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownDocumentType(s.to_string()))
    }
}

impl AuditHash for DocumentType {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("document_type").str(self.as_str());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    /// Drafting instructions handed to the generation collaborator.
    #[serde(default)]
    pub guidance: String,
}

impl Section {
    pub fn new(id: &str, title: &str, guidance: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            guidance: guidance.to_string(),
        }
    }
}

impl AuditHash for Section {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher
            .tag("section")
            .str(&self.id)
            .str(&self.title)
            .str(&self.guidance);
    }
}

/// An ordered list of sections; the order is the document's canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub document_type: DocumentType,
    pub name: String,
    pub sections: Vec<Section>,
}

impl Template {
    pub fn new(document_type: DocumentType, name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            document_type,
            name: name.into(),
            sections,
        }
    }

    /// Canonical index of a section id.
    pub fn position(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sections.is_empty() {
            return Err(format!("template '{}' has no sections", self.name));
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.id.trim().is_empty() || section.title.trim().is_empty() {
                return Err(format!(
                    "template '{}' has a section with an empty id or title",
                    self.name
                ));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(format!(
                    "template '{}' repeats section id '{}'",
                    self.name, section.id
                ));
            }
        }
        Ok(())
    }

    /// The built-in template for a document type.
    pub fn builtin(document_type: DocumentType) -> Self {
        let sections = match document_type {
            DocumentType::DemandLetter => vec![
                Section::new("introduction", "Introduction", "Identify the client, the recipient and the purpose of the letter."),
                Section::new("facts", "Statement of Facts", "Summarise the events giving rise to the claim in date order."),
                Section::new("liability", "Basis of Liability", "Explain why the recipient is responsible, citing supporting authority."),
                Section::new("damages", "Damages", "Itemise the losses claimed and how each amount was calculated."),
                Section::new("demand", "Demand", "State the amount demanded and the deadline for payment."),
                Section::new("closing", "Closing", "Note the consequences of non-payment and provide contact details."),
            ],
            DocumentType::Motion => vec![
                Section::new("caption", "Caption", "Court, parties and case number."),
                Section::new("relief", "Relief Requested", "State precisely what the court is asked to order."),
                Section::new("background", "Background", "Procedural history and material facts."),
                Section::new("argument", "Argument", "Legal argument supporting the relief, with authority."),
                Section::new("conclusion", "Conclusion", "Restate the relief requested."),
            ],
            DocumentType::Complaint => vec![
                Section::new("caption", "Caption", "Court, parties and case number."),
                Section::new("parties", "Parties", "Identify each plaintiff and defendant."),
                Section::new("jurisdiction", "Jurisdiction and Venue", "Basis for jurisdiction and venue."),
                Section::new("allegations", "Factual Allegations", "Numbered factual allegations."),
                Section::new("claims", "Causes of Action", "Each count with its elements."),
                Section::new("prayer", "Prayer for Relief", "Relief sought from the court."),
            ],
            DocumentType::SettlementAgreement => vec![
                Section::new("recitals", "Recitals", "Background of the dispute and the parties' intent to settle."),
                Section::new("payment", "Settlement Payment", "Amount, method and timing of payment."),
                Section::new("release", "Mutual Release", "Scope of the claims released by each party."),
                Section::new("confidentiality", "Confidentiality", "Restrictions on disclosure of the terms."),
                Section::new("general", "General Provisions", "Governing law, entire agreement, counterparts."),
                Section::new("signatures", "Signatures", "Signature blocks for each party."),
            ],
            DocumentType::LegalMemo => vec![
                Section::new("question", "Question Presented", "The legal question, framed narrowly."),
                Section::new("short_answer", "Short Answer", "A direct answer to the question."),
                Section::new("facts", "Facts", "Facts relevant to the analysis."),
                Section::new("discussion", "Discussion", "Analysis applying authority to the facts."),
                Section::new("conclusion", "Conclusion", "Summary and recommended next steps."),
            ],
        };
        let name = document_type.as_str().replace('_', " ");
        Self::new(document_type, name, sections)
    }
}

impl AuditHash for Template {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("template").str(&self.name);
        self.document_type.write_audit(hasher);
        self.sections.write_audit(hasher);
    }
}
