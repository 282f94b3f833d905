use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::template::DocumentType;
use crate::unit::{AuditHash, AuditHasher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// e.g. "client", "opposing_party", "plaintiff".
    pub role: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Normalized business data for one job, produced once by intake.
///
/// Read-only to the core; every task gets its own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterContext {
    pub document_type: DocumentType,
    #[serde(default)]
    pub parties: Vec<Party>,
    /// Raw key/value input as supplied.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub validation: ValidationReport,
    /// Cleaned values the generator should prefer over `fields`.
    #[serde(default)]
    pub normalized: BTreeMap<String, String>,
}

impl MatterContext {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            parties: Vec::new(),
            fields: BTreeMap::new(),
            validation: ValidationReport {
                valid: true,
                ..Default::default()
            },
            normalized: BTreeMap::new(),
        }
    }

    pub fn with_party(mut self, role: &str, name: &str) -> Self {
        self.parties.push(Party {
            role: role.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self.normalized
            .insert(key.to_string(), value.trim().to_string());
        self
    }

    /// Normalized value first, then raw.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.normalized
            .get(key)
            .or_else(|| self.fields.get(key))
            .map(String::as_str)
    }

    pub fn party(&self, role: &str) -> Option<&Party> {
        self.parties.iter().find(|p| p.role == role)
    }
}

impl AuditHash for MatterContext {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("matter");
        self.document_type.write_audit(hasher);
        hasher.u64(self.parties.len() as u64);
        for party in &self.parties {
            hasher.str(&party.role).str(&party.name);
        }
        self.fields.write_audit(hasher);
        hasher.bool(self.validation.valid);
        self.validation.errors.write_audit(hasher);
        self.validation.warnings.write_audit(hasher);
        self.normalized.write_audit(hasher);
    }
}
