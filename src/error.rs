use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classifies a failure for reporting and retry decisions.
///
/// Only pipeline nodes that produced a low score are ever retried; every kind
/// listed here is terminal for the unit or job that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad job configuration, surfaced before any work runs.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// A unit's pre- or post-condition did not hold.
    #[serde(rename = "CHECKPOINT_FAILED")]
    CheckpointFailed,
    /// A unit's transformation faulted.
    #[serde(rename = "PROCESSING_ERROR")]
    Processing,
    /// A refinement pipeline node crashed.
    #[serde(rename = "SYSTEM")]
    System,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "VALIDATION_ERROR"),
            ErrorKind::CheckpointFailed => write!(f, "CHECKPOINT_FAILED"),
            ErrorKind::Processing => write!(f, "PROCESSING_ERROR"),
            ErrorKind::System => write!(f, "SYSTEM"),
        }
    }
}

/// Failure raised by a unit of work.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnitError {
    #[error("{unit}: no input supplied")]
    MissingInput { unit: String },

    #[error("{unit}: checkpoint '{checkpoint}' failed: {message}")]
    CheckpointFailed {
        unit: String,
        checkpoint: String,
        message: String,
    },

    #[error("{unit}: processing failed: {cause}")]
    Processing { unit: String, cause: String },
}

impl UnitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitError::MissingInput { .. } | UnitError::Processing { .. } => ErrorKind::Processing,
            UnitError::CheckpointFailed { .. } => ErrorKind::CheckpointFailed,
        }
    }
}

/// Errors surfaced by the external collaborators the core consumes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("intake rejected input: {0}")]
    Intake(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("quality analysis failed: {0}")]
    Scoring(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Job-level failure: which stage failed, how, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind} in stage '{stage}': {message}")]
pub struct JobFailure {
    pub stage: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation", ErrorKind::Validation, message)
    }

    pub fn from_unit(stage: impl Into<String>, err: &UnitError) -> Self {
        Self::new(stage, err.kind(), err.to_string())
    }
}
