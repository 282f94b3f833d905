//! Orchestration core for drafting long, multi-section documents: auditable
//! units of work, sequential and parallel drafting, and a quality-gated
//! refinement pipeline.

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod document;
pub mod drafting;
pub mod error;
pub mod logging;
pub mod offline;
pub mod orchestrator;
pub mod pipeline;
pub mod router;
pub mod ui;
pub mod unit;

#[cfg(test)]
mod testing;

pub use error::{CollaboratorError, ConfigError, ErrorKind, JobFailure, UnitError};
pub use orchestrator::{JobConfig, JobOrchestrator, JobReport, Strategy};
pub use pipeline::{CompletionStatus, PipelineState, RefinementPipeline};
