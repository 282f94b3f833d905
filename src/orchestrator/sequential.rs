use super::{JobOrchestrator, Trail};
use crate::document::{ContextBundle, MatterContext, Template};
use crate::drafting::Task;
use crate::error::JobFailure;
use crate::unit::{UnitOfWork, process};

impl JobOrchestrator {
    /// One drafting worker over the full template; no split, no merge.
    pub(super) async fn draft_sequential(
        &self,
        template: &Template,
        matter: &MatterContext,
        context: &ContextBundle,
        trail: &mut Trail<'_>,
    ) -> Result<String, JobFailure> {
        let worker = self.worker();
        trail.stage(worker.name());

        let task = Task::whole(template, matter, context);
        match process(&worker, Some(&task)).await {
            Ok(success) => {
                trail.success(&success);
                trail.drafted(&success.output, &self.pricing);
                Ok(success.output.text)
            }
            Err(failure) => {
                trail.failure(&failure);
                Err(JobFailure::from_unit(worker.name(), &failure.error))
            }
        }
    }
}
