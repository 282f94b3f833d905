use std::sync::Arc;

use tokio::task::JoinSet;

use super::{JobOrchestrator, Trail};
use crate::document::{ContextBundle, MatterContext, Template};
use crate::drafting::{MergeRequest, MergeStage, SplitRequest, Task, TaskSplitter};
use crate::error::{ErrorKind, JobFailure};
use crate::unit::{UnitOfWork, process};

impl JobOrchestrator {
    /// Split → one worker per task, all concurrent → merge.
    ///
    /// The first worker failure aborts the join; remaining workers are
    /// cancelled when the set is dropped and nothing is merged.
    pub(super) async fn draft_parallel(
        &self,
        template: &Template,
        matter: &MatterContext,
        context: &ContextBundle,
        max_parallel: usize,
        trail: &mut Trail<'_>,
    ) -> Result<String, JobFailure> {
        let tasks = self
            .split(template, matter, context, max_parallel, trail)
            .await?;

        let count = tasks.len();
        trail.stage(format!("{count} drafting workers ran in parallel"));

        let worker = Arc::new(self.worker());
        let mut set = JoinSet::new();
        for task in tasks {
            let worker = Arc::clone(&worker);
            set.spawn(async move { process(worker.as_ref(), Some(&task)).await });
        }

        let mut drafts = Vec::with_capacity(count);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(success)) => {
                    trail.success(&success);
                    trail.drafted(&success.output, &self.pricing);
                    drafts.push(success.output);
                }
                Ok(Err(failure)) => {
                    trail.failure(&failure);
                    set.abort_all();
                    tracing::warn!(
                        completed = drafts.len(),
                        total = count,
                        "drafting worker failed, discarding sibling drafts"
                    );
                    return Err(JobFailure::from_unit(worker.name(), &failure.error));
                }
                Err(join_error) => {
                    set.abort_all();
                    return Err(JobFailure::new(
                        worker.name(),
                        ErrorKind::Processing,
                        join_error.to_string(),
                    ));
                }
            }
        }

        trail.stage(MergeStage.name());
        let request = MergeRequest {
            template: template.clone(),
            drafts,
        };
        match process(&MergeStage, Some(&request)).await {
            Ok(success) => {
                trail.success(&success);
                Ok(success.output.text)
            }
            Err(failure) => {
                trail.failure(&failure);
                Err(JobFailure::from_unit(MergeStage.name(), &failure.error))
            }
        }
    }

    async fn split(
        &self,
        template: &Template,
        matter: &MatterContext,
        context: &ContextBundle,
        max_parallel: usize,
        trail: &mut Trail<'_>,
    ) -> Result<Vec<Task>, JobFailure> {
        trail.stage(TaskSplitter.name());
        let request = SplitRequest {
            template: template.clone(),
            matter: matter.clone(),
            context: context.clone(),
            max_parallel,
        };
        match process(&TaskSplitter, Some(&request)).await {
            Ok(success) => {
                trail.success(&success);
                Ok(success.output)
            }
            Err(failure) => {
                trail.failure(&failure);
                Err(JobFailure::from_unit(TaskSplitter.name(), &failure.error))
            }
        }
    }
}
