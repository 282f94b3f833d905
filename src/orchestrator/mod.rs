//! End-to-end job execution: validate → intake → retrieval → drafting
//! (sequential or parallel) → optional refinement → persistence.
//!
//! Both strategies share every step except drafting and report through the
//! same [`JobReport`], so audit trails are comparable across strategies.

mod parallel;
mod sequential;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::collaborators::{Generator, Intake, Persistence, Retriever, SavedDocument};
use crate::config::{DraftingConfig, PricingConfig};
use crate::document::{ContextBundle, DocumentType, MatterContext, Template};
use crate::drafting::{DraftingWorker, PartialDraft};
use crate::error::{ErrorKind, JobFailure};
use crate::pipeline::{
    CompletionStatus, PipelineState, PipelineSummary, RefinementPipeline, ResourceUsage,
};
use crate::unit::{AgentLogEntry, AuditSink, Checkpoint, UnitFailure, UnitSuccess};

/// How the draft is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One drafting worker over the whole template.
    Sequential,
    /// Split → concurrent workers → merge.
    Parallel,
}

impl Strategy {
    /// Sequential for short templates or when only one worker is allowed.
    pub fn auto(template: &Template, max_parallel: usize) -> Self {
        if template.sections.len() <= 2 || max_parallel <= 1 {
            Strategy::Sequential
        } else {
            Strategy::Parallel
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Optional per-job switches. Unset values fall back to configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFlags {
    /// `None` lets [`Strategy::auto`] decide.
    pub strategy: Option<Strategy>,
    pub max_parallel: Option<usize>,
    /// Run the refinement pipeline when one is attached.
    pub refine: bool,
}

impl Default for JobFlags {
    fn default() -> Self {
        Self {
            strategy: None,
            max_parallel: None,
            refine: true,
        }
    }
}

/// What the caller asks for. Never mutated once a job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub document_type: String,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub flags: JobFlags,
}

impl JobConfig {
    pub fn new(
        document_type: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            document_type: document_type.into(),
            input: input.into(),
            output: output.into(),
            flags: JobFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: JobFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Resolve the document type and reject empty paths.
    pub fn validate(&self) -> Result<DocumentType, JobFailure> {
        let document_type = self
            .document_type
            .parse::<DocumentType>()
            .map_err(|e| JobFailure::validation(e.to_string()))?;
        if self.input.trim().is_empty() {
            return Err(JobFailure::validation("input reference is empty"));
        }
        if self.output.trim().is_empty() {
            return Err(JobFailure::validation("output destination is empty"));
        }
        if self.flags.max_parallel == Some(0) {
            return Err(JobFailure::validation("max_parallel must be at least 1"));
        }
        Ok(document_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        document: String,
        saved: SavedDocument,
    },
    Failed(JobFailure),
}

/// The audit block every strategy fills identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub processing_time_ms: u64,
    /// Stages and units, in the order they started.
    pub execution_order: Vec<String>,
    pub checkpoints: Vec<Checkpoint>,
    pub log_entries: Vec<AgentLogEntry>,
    pub warnings: Vec<String>,
    /// Generation calls made by drafting workers. Refinement calls are
    /// counted separately in `refinement.usage`.
    pub drafting_usage: ResourceUsage,
    pub refinement: Option<PipelineSummary>,
}

impl ExecutionMetadata {
    /// Drafting and refinement calls together.
    pub fn total_usage(&self) -> ResourceUsage {
        let mut total = self.drafting_usage.clone();
        if let Some(refinement) = &self.refinement {
            total.absorb(&refinement.usage);
        }
        total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub document_type: Option<DocumentType>,
    pub strategy: Option<Strategy>,
    pub outcome: JobOutcome,
    pub metadata: ExecutionMetadata,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }

    pub fn document(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Completed { document, .. } => Some(document),
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            JobOutcome::Completed { .. } => None,
            JobOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// The external services a job talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub intake: Arc<dyn Intake>,
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub persistence: Arc<dyn Persistence>,
}

/// Per-job audit accumulator. Every unit result passes through here so the
/// sink and the report see the same entries.
pub(crate) struct Trail<'a> {
    sink: &'a dyn AuditSink,
    started: Instant,
    metadata: ExecutionMetadata,
}

impl<'a> Trail<'a> {
    fn new(sink: &'a dyn AuditSink) -> Self {
        Self {
            sink,
            started: Instant::now(),
            metadata: ExecutionMetadata::default(),
        }
    }

    pub(crate) fn stage(&mut self, name: impl Into<String>) {
        let name = name.into();
        tracing::debug!(stage = %name, "stage started");
        self.metadata.execution_order.push(name);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.metadata.warnings.push(message);
    }

    pub(crate) fn success<T>(&mut self, success: &UnitSuccess<T>) {
        self.metadata
            .checkpoints
            .extend(success.checkpoints.iter().cloned());
        self.sink.record(&success.log_entry);
        self.metadata.log_entries.push(success.log_entry.clone());
    }

    /// Account one worker's generation call.
    pub(crate) fn drafted(&mut self, draft: &PartialDraft, pricing: &PricingConfig) {
        self.metadata.drafting_usage.record(
            draft.metadata.tier,
            draft.metadata.estimated_tokens,
            pricing,
        );
    }

    pub(crate) fn failure<T>(&mut self, failure: &UnitFailure<T>) {
        self.metadata
            .checkpoints
            .extend(failure.checkpoints.iter().cloned());
    }

    fn finish(mut self) -> ExecutionMetadata {
        self.metadata.processing_time_ms = self.started.elapsed().as_millis() as u64;
        self.metadata
    }
}

/// Runs jobs with either drafting strategy and an optional refinement pass.
pub struct JobOrchestrator {
    collaborators: Collaborators,
    drafting: DraftingConfig,
    pricing: PricingConfig,
    sink: Arc<dyn AuditSink>,
    pipeline: Option<Arc<RefinementPipeline>>,
    templates: BTreeMap<DocumentType, Template>,
}

impl JobOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        drafting: DraftingConfig,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            collaborators,
            drafting,
            pricing: PricingConfig::default(),
            sink,
            pipeline: None,
            templates: BTreeMap::new(),
        }
    }

    /// Refine every draft before persisting it.
    pub fn with_pipeline(mut self, pipeline: RefinementPipeline) -> Self {
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    /// Price drafting calls with `pricing` instead of the defaults.
    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// Draft `template.document_type` jobs with `template` instead of the
    /// built-in one.
    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.insert(template.document_type, template);
        self
    }

    pub fn template_for(&self, document_type: DocumentType) -> Template {
        self.templates
            .get(&document_type)
            .cloned()
            .unwrap_or_else(|| Template::builtin(document_type))
    }

    /// Run `job` with an explicit strategy, ignoring `job.flags.strategy`.
    pub async fn run_with(&self, job: &JobConfig, strategy: Strategy) -> JobReport {
        let mut flags = job.flags.clone();
        flags.strategy = Some(strategy);
        self.run_job(&job.clone().with_flags(flags)).await
    }

    pub async fn run_sequential(&self, job: &JobConfig) -> JobReport {
        self.run_with(job, Strategy::Sequential).await
    }

    pub async fn run_parallel(&self, job: &JobConfig) -> JobReport {
        self.run_with(job, Strategy::Parallel).await
    }

    /// Run a job to completion or failure. Never panics; every failure is
    /// reported in the returned [`JobReport`].
    pub async fn run_job(&self, job: &JobConfig) -> JobReport {
        let job_id = Uuid::new_v4();
        let span = tracing::info_span!("job", %job_id, document_type = %job.document_type);
        self.execute(job_id, job).instrument(span).await
    }

    async fn execute(&self, job_id: Uuid, job: &JobConfig) -> JobReport {
        let mut trail = Trail::new(self.sink.as_ref());
        let mut report = JobReport {
            job_id,
            document_type: None,
            strategy: None,
            outcome: JobOutcome::Failed(JobFailure::validation("job did not start")),
            metadata: ExecutionMetadata::default(),
        };

        let outcome = self.stages(job, &mut trail, &mut report).await;
        report.outcome = match outcome {
            Ok((document, saved)) => {
                tracing::info!(path = %saved.path, bytes = saved.size, "job completed");
                JobOutcome::Completed { document, saved }
            }
            Err(failure) => {
                tracing::error!(%failure, "job failed");
                JobOutcome::Failed(failure)
            }
        };
        let refinement = report.metadata.refinement.take();
        report.metadata = trail.finish();
        report.metadata.refinement = refinement;
        report
    }

    async fn stages(
        &self,
        job: &JobConfig,
        trail: &mut Trail<'_>,
        report: &mut JobReport,
    ) -> Result<(String, SavedDocument), JobFailure> {
        trail.stage("validation");
        let document_type = job.validate()?;
        report.document_type = Some(document_type);

        let template = self.template_for(document_type);
        template
            .validate()
            .map_err(|e| JobFailure::new("validation", ErrorKind::Validation, e))?;
        let max_parallel = job.flags.max_parallel.unwrap_or(self.drafting.max_parallel);
        let strategy = job
            .flags
            .strategy
            .unwrap_or_else(|| Strategy::auto(&template, max_parallel));
        report.strategy = Some(strategy);

        trail.stage("intake");
        let matter = self.intake(job, document_type).await?;

        trail.stage("retrieval");
        let context = self.retrieve(&matter, trail).await;

        let draft = match strategy {
            Strategy::Sequential => {
                self.draft_sequential(&template, &matter, &context, trail)
                    .await?
            }
            Strategy::Parallel => {
                self.draft_parallel(&template, &matter, &context, max_parallel, trail)
                    .await?
            }
        };

        let document = match &self.pipeline {
            Some(pipeline) if job.flags.refine => {
                trail.stage("refinement_pipeline");
                let state = PipelineState::new(
                    template.clone(),
                    matter.clone(),
                    context.clone(),
                    pipeline.max_iterations(),
                )
                .with_draft(draft);
                let state = pipeline.run(state).await;
                report.metadata.refinement = Some(state.summary());
                self.refined_document(state, trail)?
            }
            _ => draft,
        };

        trail.stage("persistence");
        let saved = self
            .collaborators
            .persistence
            .save(&document, &job.output)
            .await
            .map_err(|e| JobFailure::new("persistence", ErrorKind::System, e.to_string()))?;
        Ok((document, saved))
    }

    async fn intake(
        &self,
        job: &JobConfig,
        document_type: DocumentType,
    ) -> Result<MatterContext, JobFailure> {
        let matter = self
            .collaborators
            .intake
            .normalize(&job.input, document_type)
            .await
            .map_err(|e| JobFailure::new("intake", ErrorKind::Validation, e.to_string()))?;
        if !matter.validation.valid {
            return Err(JobFailure::new(
                "intake",
                ErrorKind::Validation,
                matter.validation.errors.join("; "),
            ));
        }
        Ok(matter)
    }

    /// Best effort: any failure yields an empty bundle.
    async fn retrieve(&self, matter: &MatterContext, trail: &mut Trail<'_>) -> ContextBundle {
        match self.collaborators.retriever.retrieve(matter).await {
            Ok(context) => context,
            Err(e) => {
                trail.warn(format!("retrieval failed, continuing without context: {e}"));
                ContextBundle::empty()
            }
        }
    }

    fn refined_document(
        &self,
        state: PipelineState,
        trail: &mut Trail<'_>,
    ) -> Result<String, JobFailure> {
        match state.status {
            CompletionStatus::Failed => {
                let message = state
                    .errors
                    .last()
                    .map(|e| format!("{} failed: {}", e.node, e.message))
                    .unwrap_or_else(|| "refinement pipeline failed".into());
                Err(JobFailure::new("refinement_pipeline", ErrorKind::System, message))
            }
            status => {
                if status == CompletionStatus::Unresolved {
                    trail.warn(format!(
                        "refinement ended '{status}' at score {:?}",
                        state.quality_score
                    ));
                }
                state.final_document.ok_or_else(|| {
                    JobFailure::new(
                        "refinement_pipeline",
                        ErrorKind::System,
                        "pipeline finished without a final document",
                    )
                })
            }
        }
    }

    fn worker(&self) -> DraftingWorker {
        DraftingWorker::new(
            Arc::clone(&self.collaborators.generator),
            self.drafting.min_draft_chars,
            self.drafting.chars_per_token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrieflowConfig;
    use crate::error::CollaboratorError;
    use crate::testing::{
        FailingScorer, MemoryAuditSink, MemoryPersistence, PanickingScorer, ScriptedGenerator,
        ScriptedScorer, StaticIntake, StaticRetriever,
    };

    struct Harness {
        generator: Arc<ScriptedGenerator>,
        persistence: Arc<MemoryPersistence>,
        sink: Arc<MemoryAuditSink>,
        orchestrator: JobOrchestrator,
    }

    fn harness(generator: ScriptedGenerator, retriever: StaticRetriever) -> Harness {
        let generator = Arc::new(generator);
        let persistence = Arc::new(MemoryPersistence::default());
        let sink = Arc::new(MemoryAuditSink::default());
        let collaborators = Collaborators {
            intake: Arc::new(StaticIntake::ok(DocumentType::Motion)),
            retriever: Arc::new(retriever),
            generator: generator.clone(),
            persistence: persistence.clone(),
        };
        let orchestrator =
            JobOrchestrator::new(collaborators, DraftingConfig::default(), sink.clone());
        Harness {
            generator,
            persistence,
            sink,
            orchestrator,
        }
    }

    fn ok_retriever() -> StaticRetriever {
        StaticRetriever(Ok(ContextBundle::empty()))
    }

    fn motion_job() -> JobConfig {
        JobConfig::new("motion", "matter.json", "out/motion.md")
    }

    #[test]
    fn strategy_auto_thresholds() {
        let motion = Template::builtin(DocumentType::Motion);
        assert_eq!(Strategy::auto(&motion, 4), Strategy::Parallel);
        assert_eq!(Strategy::auto(&motion, 1), Strategy::Sequential);

        let short = Template::new(
            DocumentType::Motion,
            "short",
            motion.sections[..2].to_vec(),
        );
        assert_eq!(Strategy::auto(&short, 4), Strategy::Sequential);
    }

    #[test]
    fn job_validation_rejects_bad_config() {
        let unknown = JobConfig::new("haiku_poem", "in", "out").validate();
        assert_eq!(unknown.unwrap_err().kind, ErrorKind::Validation);

        let empty_output = JobConfig::new("motion", "in", " ").validate();
        assert!(empty_output.unwrap_err().message.contains("output"));

        let zero = JobConfig::new("motion", "in", "out").with_flags(JobFlags {
            max_parallel: Some(0),
            ..JobFlags::default()
        });
        assert!(zero.validate().is_err());

        assert_eq!(
            JobConfig::new("Legal-Memo", "in", "out").validate(),
            Ok(DocumentType::LegalMemo)
        );
    }

    #[tokio::test]
    async fn invalid_job_fails_before_any_collaborator_call() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let report = h
            .orchestrator
            .run_job(&JobConfig::new("motion", "", "out.md"))
            .await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(report.metadata.execution_order, vec!["validation"]);
        assert_eq!(h.generator.calls(), 0);
        assert!(h.persistence.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequential_job_runs_one_worker_and_persists() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let report = h.orchestrator.run_sequential(&motion_job()).await;

        assert!(report.is_success(), "{:?}", report.failure());
        assert_eq!(report.strategy, Some(Strategy::Sequential));
        assert_eq!(
            report.metadata.execution_order,
            vec![
                "validation",
                "intake",
                "retrieval",
                "drafting_worker",
                "persistence"
            ]
        );
        assert_eq!(h.generator.calls(), 1);
        assert_eq!(report.metadata.log_entries.len(), 1);
        assert_eq!(h.sink.units(), vec!["drafting_worker"]);

        let saved = h.persistence.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "out/motion.md");
        assert!(saved[0].1.contains("## Caption"));
    }

    #[tokio::test]
    async fn retrieval_failure_still_completes_with_empty_context() {
        let h = harness(
            ScriptedGenerator::new(),
            StaticRetriever(Err(CollaboratorError::Retrieval("index offline".into()))),
        );
        let report = h.orchestrator.run_sequential(&motion_job()).await;

        assert!(report.is_success());
        assert_eq!(report.metadata.warnings.len(), 1);
        assert!(report.metadata.warnings[0].contains("index offline"));

        let contexts = h.generator.contexts();
        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].passages.is_empty());
        assert_eq!(contexts[0].query.total_tokens, 0);
    }

    #[tokio::test]
    async fn drafting_calls_are_counted_in_job_usage() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let pipeline = RefinementPipeline::new(
            h.generator.clone(),
            Arc::new(ScriptedScorer::new(&[95.0])),
            &BrieflowConfig::default(),
        );
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let report = orchestrator.run_parallel(&motion_job()).await;

        assert!(report.is_success(), "{:?}", report.failure());
        let workers = h
            .sink
            .units()
            .iter()
            .filter(|u| *u == "drafting_worker")
            .count() as u32;
        assert!(workers > 1);
        assert_eq!(report.metadata.drafting_usage.total_calls(), workers);
        assert!(report.metadata.drafting_usage.estimated_tokens > 0);

        let refinement = report.metadata.refinement.as_ref().unwrap().usage.total_calls();
        assert_eq!(report.metadata.total_usage().total_calls(), workers + refinement);
    }

    #[tokio::test]
    async fn intake_failure_is_a_validation_error() {
        let generator = Arc::new(ScriptedGenerator::new());
        let collaborators = Collaborators {
            intake: Arc::new(StaticIntake(Err(CollaboratorError::Intake(
                "missing client name".into(),
            )))),
            retriever: Arc::new(ok_retriever()),
            generator: generator.clone(),
            persistence: Arc::new(MemoryPersistence::default()),
        };
        let orchestrator = JobOrchestrator::new(
            collaborators,
            DraftingConfig::default(),
            Arc::new(MemoryAuditSink::default()),
        );
        let report = orchestrator.run_job(&motion_job()).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, "intake");
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn post_check_failure_is_never_persisted() {
        let h = harness(
            ScriptedGenerator::new().with_placeholder("{{deadline}}"),
            ok_retriever(),
        );
        let report = h.orchestrator.run_sequential(&motion_job()).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::CheckpointFailed);
        assert!(failure.message.contains("no_placeholders"));
        assert!(h.persistence.saved.lock().unwrap().is_empty());
        assert!(report.metadata.checkpoints.iter().any(|c| !c.passed));
        assert!(report.metadata.log_entries.is_empty());
    }

    #[tokio::test]
    async fn refinement_output_is_what_gets_persisted() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let pipeline = RefinementPipeline::new(
            h.generator.clone(),
            Arc::new(ScriptedScorer::new(&[95.0])),
            &BrieflowConfig::default(),
        );
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let report = orchestrator.run_sequential(&motion_job()).await;

        assert!(report.is_success());
        let summary = report.metadata.refinement.as_ref().unwrap();
        assert_eq!(summary.status, CompletionStatus::FinalApproved);
        assert!(report.document().unwrap().starts_with("# Motion\n"));
        assert_eq!(
            h.persistence.saved.lock().unwrap()[0].1,
            report.document().unwrap()
        );
    }

    #[tokio::test]
    async fn unresolved_refinement_persists_with_warning() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let mut config = BrieflowConfig::default();
        config.pipeline.max_iterations = 1;
        let pipeline = RefinementPipeline::new(
            h.generator.clone(),
            Arc::new(ScriptedScorer::new(&[40.0])),
            &config,
        );
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let report = orchestrator.run_sequential(&motion_job()).await;

        assert!(report.is_success());
        assert!(
            report
                .metadata
                .warnings
                .iter()
                .any(|w| w.contains("max iterations, unresolved"))
        );
        assert_eq!(h.persistence.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_refinement_fails_the_job_as_system() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let pipeline = RefinementPipeline::new(
            h.generator.clone(),
            Arc::new(FailingScorer),
            &BrieflowConfig::default(),
        );
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let report = orchestrator.run_sequential(&motion_job()).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::System);
        assert_eq!(failure.stage, "refinement_pipeline");
        assert!(failure.message.contains("QUALITY_ANALYSIS"));
        assert!(h.persistence.saved.lock().unwrap().is_empty());
        assert!(report.metadata.refinement.is_some());
    }

    #[tokio::test]
    async fn panicking_scorer_fails_the_job_as_system() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let pipeline = RefinementPipeline::new(
            h.generator.clone(),
            Arc::new(PanickingScorer),
            &BrieflowConfig::default(),
        );
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let report = orchestrator.run_sequential(&motion_job()).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::System);
        assert_eq!(failure.stage, "refinement_pipeline");
        assert!(failure.message.contains("scorer blew up"));
        assert!(h.persistence.saved.lock().unwrap().is_empty());
        let summary = report.metadata.refinement.as_ref().unwrap();
        assert_eq!(summary.status, CompletionStatus::Failed);
    }

    #[tokio::test]
    async fn no_refine_flag_skips_attached_pipeline() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let scorer = Arc::new(ScriptedScorer::new(&[95.0]));
        let pipeline =
            RefinementPipeline::new(h.generator.clone(), scorer.clone(), &BrieflowConfig::default());
        let orchestrator = h.orchestrator.with_pipeline(pipeline);
        let job = motion_job().with_flags(JobFlags {
            refine: false,
            ..JobFlags::default()
        });
        let report = orchestrator.run_sequential(&job).await;

        assert!(report.is_success());
        assert!(report.metadata.refinement.is_none());
        assert_eq!(scorer.calls(), 0);
    }

    #[tokio::test]
    async fn report_serializes_outcome_and_wire_kinds() {
        let h = harness(ScriptedGenerator::new(), ok_retriever());
        let report = h
            .orchestrator
            .run_job(&JobConfig::new("poem", "in", "out"))
            .await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["result"], "failed");
        assert_eq!(json["outcome"]["kind"], "VALIDATION_ERROR");
    }
}
