//! Unit-of-work lifecycle and the audit records it produces.

mod audit;
mod contract;

pub use audit::{
    AgentLogEntry, AuditHash, AuditHasher, AuditSink, Checkpoint, LogMetadata, NullAuditSink,
    TracingAuditSink,
};
pub use contract::{UnitFailure, UnitOfWork, UnitResult, UnitSuccess, process};
pub(crate) use contract::panic_message;
