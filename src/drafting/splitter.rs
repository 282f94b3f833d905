use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{ContextBundle, DocumentType, MatterContext, Section, Template};
use crate::error::UnitError;
use crate::unit::{AuditHash, AuditHasher, Checkpoint, UnitOfWork};

/// One partition of a template, owned by exactly one drafting worker.
///
/// Carries its own copies of the matter and context so concurrent workers
/// share nothing mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Assignment order; ties in canonical order are broken by it.
    pub sequence: usize,
    pub document_type: DocumentType,
    pub sections: Vec<Section>,
    pub matter: MatterContext,
    pub context: ContextBundle,
}

impl Task {
    /// A single task spanning the whole template.
    pub fn whole(template: &Template, matter: &MatterContext, context: &ContextBundle) -> Self {
        Self {
            sequence: 0,
            document_type: template.document_type,
            sections: template.sections.clone(),
            matter: matter.clone(),
            context: context.clone(),
        }
    }

    pub fn section_ids(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.id.clone()).collect()
    }
}

impl AuditHash for Task {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("task").u64(self.sequence as u64);
        self.document_type.write_audit(hasher);
        self.sections.write_audit(hasher);
        self.matter.write_audit(hasher);
        self.context.write_audit(hasher);
    }
}

/// Divide the template into at most `max_parallel` contiguous, non-empty,
/// size-balanced slices. The first `len % n` tasks take one extra section.
///
/// Deterministic: the assignment depends only on the section count and
/// `max_parallel`.
pub fn split(
    template: &Template,
    matter: &MatterContext,
    context: &ContextBundle,
    max_parallel: usize,
) -> Vec<Task> {
    let total = template.sections.len();
    let count = total.min(max_parallel.max(1));
    if count == 0 {
        return Vec::new();
    }

    let base = total / count;
    let extra = total % count;

    let mut tasks = Vec::with_capacity(count);
    let mut start = 0;
    for sequence in 0..count {
        let len = base + usize::from(sequence < extra);
        tasks.push(Task {
            sequence,
            document_type: template.document_type,
            sections: template.sections[start..start + len].to_vec(),
            matter: matter.clone(),
            context: context.clone(),
        });
        start += len;
    }
    tasks
}

#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub template: Template,
    pub matter: MatterContext,
    pub context: ContextBundle,
    pub max_parallel: usize,
}

impl AuditHash for SplitRequest {
    fn write_audit(&self, hasher: &mut AuditHasher) {
        hasher.tag("split_request").u64(self.max_parallel as u64);
        self.template.write_audit(hasher);
        self.matter.write_audit(hasher);
        self.context.write_audit(hasher);
    }
}

/// [`split`] wrapped as an auditable unit.
#[derive(Debug, Default)]
pub struct TaskSplitter;

#[async_trait]
impl UnitOfWork for TaskSplitter {
    type Input = SplitRequest;
    type Output = Vec<Task>;

    fn name(&self) -> &str {
        "task_splitter"
    }

    fn pre_checks(&self, input: &SplitRequest) -> Vec<Checkpoint> {
        let template_check = match input.template.validate() {
            Ok(()) => Checkpoint::pass("template_valid"),
            Err(message) => Checkpoint::fail("template_valid", message),
        };
        vec![
            template_check,
            Checkpoint::check("parallelism_positive", input.max_parallel > 0, || {
                "max_parallel must be at least 1".into()
            }),
        ]
    }

    async fn execute(&self, input: &SplitRequest) -> Result<Vec<Task>, UnitError> {
        Ok(split(
            &input.template,
            &input.matter,
            &input.context,
            input.max_parallel,
        ))
    }

    fn post_checks(&self, input: &SplitRequest, tasks: &Vec<Task>) -> Vec<Checkpoint> {
        let assigned: Vec<&str> = tasks
            .iter()
            .flat_map(|t| t.sections.iter().map(|s| s.id.as_str()))
            .collect();
        let expected: Vec<&str> = input.template.sections.iter().map(|s| s.id.as_str()).collect();

        vec![
            Checkpoint::check(
                "task_count_bounded",
                tasks.len() <= input.max_parallel,
                || format!("{} tasks exceed max_parallel {}", tasks.len(), input.max_parallel),
            ),
            Checkpoint::check(
                "no_empty_tasks",
                tasks.iter().all(|t| !t.sections.is_empty()),
                || "an empty task was produced".into(),
            ),
            Checkpoint::check("covers_template_in_order", assigned == expected, || {
                format!("assigned sections {assigned:?} do not match template {expected:?}")
            }),
        ]
    }
}
