//! Audit primitives: checkpoints, log entries, typed content hashing, and the
//! sink that receives log entries.
//!
//! Hashes are BLAKE3 over an explicit, length-prefixed encoding written by
//! each entity's [`AuditHash`] impl. They correlate inputs and outputs in the
//! audit trail; they are not a security boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named boolean invariant evaluated before or after a unit executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Passes when `ok` holds, otherwise fails with `message`.
    pub fn check(name: impl Into<String>, ok: bool, message: impl FnOnce() -> String) -> Self {
        if ok {
            Self::pass(name)
        } else {
            Self::fail(name, message())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub duration_ms: u64,
    pub checkpoints_passed: usize,
}

/// One append-only audit record per successful unit execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLogEntry {
    pub unit: String,
    pub input_hash: String,
    pub output_hash: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: LogMetadata,
}

/// Receives log entries as units complete.
///
/// Passed explicitly into orchestrators so audit output can be captured or
/// redirected per job.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AgentLogEntry);
}

/// Forwards every entry to `tracing` under the `brieflow::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AgentLogEntry) {
        tracing::info!(
            target: "brieflow::audit",
            unit = %entry.unit,
            input_hash = %entry.input_hash,
            output_hash = %entry.output_hash,
            duration_ms = entry.metadata.duration_ms,
            checkpoints_passed = entry.metadata.checkpoints_passed,
            "unit completed"
        );
    }
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _entry: &AgentLogEntry) {}
}

/// Incremental BLAKE3 hasher with a length-prefixed field encoding.
pub struct AuditHasher {
    inner: blake3::Hasher,
}

impl Default for AuditHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Entity discriminator so equal field bytes of different types differ.
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.inner.update(b"#");
        self.str(tag)
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        self.inner.update(&(bytes.len() as u64).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.inner.update(&value.to_be_bytes());
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.inner.update(&value.to_bits().to_be_bytes());
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.inner.update(&[u8::from(value)]);
        self
    }

    pub fn finish(&self) -> String {
        self.inner.finalize().to_hex().to_string()
    }
}

/// Explicit, typed audit encoding for a data-model entity.
pub trait AuditHash {
    fn write_audit(&self, hasher: &mut AuditHasher);

    fn audit_hash(&self) -> String {
        let mut hasher = AuditHasher::new();
        self.write_audit(&mut hasher);
        hasher.finish()
    }
}

impl AuditHash for str {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("str").str(self);
    }
}

impl AuditHash for String {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        self.as_str().write_audit(hasher);
    }
}

impl<T: AuditHash> AuditHash for [T] {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("seq").u64(self.len() as u64);
        for item in self {
            item.write_audit(hasher);
        }
    }
}

impl<T: AuditHash> AuditHash for Vec<T> {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        self.as_slice().write_audit(hasher);
    }
}

impl<T: AuditHash> AuditHash for Option<T> {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        match self {
            Some(value) => {
                hasher.bool(true);
                value.write_audit(hasher);
            }
            None => {
                hasher.bool(false);
            }
        }
    }
}

impl AuditHash for BTreeMap<String, String> {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("map").u64(self.len() as u64);
        for (key, value) in self {
            hasher.str(key).str(value);
        }
    }
}
