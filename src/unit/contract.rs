use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;

use super::audit::{AgentLogEntry, AuditHash, Checkpoint, LogMetadata};
use crate::error::UnitError;

/// A single auditable processing step.
///
/// Implementors supply the core transformation and, optionally, the
/// checkpoints evaluated around it. The lifecycle itself lives in
/// [`process`], so every unit is validated, checked and logged the same way.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Input: AuditHash + Send + Sync;
    type Output: AuditHash + Send;

    fn name(&self) -> &str;

    fn pre_checks(&self, _input: &Self::Input) -> Vec<Checkpoint> {
        Vec::new()
    }

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, UnitError>;

    fn post_checks(&self, _input: &Self::Input, _output: &Self::Output) -> Vec<Checkpoint> {
        Vec::new()
    }
}

#[derive(Debug)]
pub struct UnitSuccess<T> {
    pub output: T,
    pub duration: Duration,
    pub checkpoints: Vec<Checkpoint>,
    pub log_entry: AgentLogEntry,
}

#[derive(Debug)]
pub struct UnitFailure<T> {
    pub error: UnitError,
    pub duration: Duration,
    pub checkpoints: Vec<Checkpoint>,
    /// Output of a transformation whose post-checks failed. Kept for
    /// diagnostics only; orchestrators never merge or persist it.
    pub rejected_output: Option<T>,
}

pub type UnitResult<T> = Result<UnitSuccess<T>, UnitFailure<T>>;

/// Run `unit` through its full lifecycle:
/// missing input → pre-checks → execute → post-checks → log entry.
///
/// Never panics and never propagates a fault from `execute`; both errors and
/// panics become `PROCESSING_ERROR` failures. Side effects of `execute` are
/// not rolled back when a post-check fails.
pub async fn process<U>(unit: &U, input: Option<&U::Input>) -> UnitResult<U::Output>
where
    U: UnitOfWork + ?Sized,
{
    let started = Instant::now();
    let name = unit.name().to_string();

    let Some(input) = input else {
        tracing::warn!(unit = %name, "unit invoked without input");
        return Err(UnitFailure {
            error: UnitError::MissingInput { unit: name },
            duration: started.elapsed(),
            checkpoints: Vec::new(),
            rejected_output: None,
        });
    };

    let mut checkpoints = unit.pre_checks(input);
    if let Some(error) = first_failed(&name, &checkpoints) {
        tracing::warn!(unit = %name, %error, "pre-check failed");
        return Err(UnitFailure {
            error,
            duration: started.elapsed(),
            checkpoints,
            rejected_output: None,
        });
    }

    let output = match AssertUnwindSafe(unit.execute(input)).catch_unwind().await {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => {
            tracing::warn!(unit = %name, %error, "unit execution failed");
            return Err(UnitFailure {
                error,
                duration: started.elapsed(),
                checkpoints,
                rejected_output: None,
            });
        }
        Err(panic) => {
            let error = UnitError::Processing {
                unit: name.clone(),
                cause: panic_message(panic.as_ref()),
            };
            tracing::error!(unit = %name, %error, "unit execution panicked");
            return Err(UnitFailure {
                error,
                duration: started.elapsed(),
                checkpoints,
                rejected_output: None,
            });
        }
    };

    let post = unit.post_checks(input, &output);
    let post_error = first_failed(&name, &post);
    checkpoints.extend(post);
    if let Some(error) = post_error {
        tracing::warn!(unit = %name, %error, "post-check failed");
        return Err(UnitFailure {
            error,
            duration: started.elapsed(),
            checkpoints,
            rejected_output: Some(output),
        });
    }

    let duration = started.elapsed();
    let log_entry = AgentLogEntry {
        unit: name,
        input_hash: input.audit_hash(),
        output_hash: output.audit_hash(),
        timestamp: Utc::now(),
        metadata: LogMetadata {
            duration_ms: duration.as_millis() as u64,
            checkpoints_passed: checkpoints.len(),
        },
    };
    tracing::debug!(unit = %log_entry.unit, duration_ms = log_entry.metadata.duration_ms, "unit succeeded");

    Ok(UnitSuccess {
        output,
        duration,
        checkpoints,
        log_entry,
    })
}

fn first_failed(unit: &str, checkpoints: &[Checkpoint]) -> Option<UnitError> {
    checkpoints
        .iter()
        .find(|c| !c.passed)
        .map(|c| UnitError::CheckpointFailed {
            unit: unit.to_string(),
            checkpoint: c.name.clone(),
            message: c.message.clone().unwrap_or_default(),
        })
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
