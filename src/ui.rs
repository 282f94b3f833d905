//! Interface de terminal do brieflow: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! a execução de um job no terminal.

use anyhow::Result;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::document::{DocumentType, Template};
use crate::orchestrator::{JobOutcome, JobReport};
use crate::pipeline::CompletionStatus;
use crate::router::ModelTier;

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e avisos (amarelo).
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl JobProgress {
    /// Inicia o spinner com a descrição do job.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("drafting {description}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Finaliza o spinner e exibe o resultado do job.
    pub fn complete(&self, report: &JobReport) {
        self.pb.finish_and_clear();
        match &report.outcome {
            JobOutcome::Completed { saved, .. } => {
                println!(
                    "  {} Saved {} ({} bytes)",
                    self.green.apply_to("✓"),
                    saved.path,
                    saved.size
                );
            }
            JobOutcome::Failed(failure) => {
                println!("  {} Job failed: {failure}", self.red.apply_to("✗"));
            }
        }
        for warning in &report.metadata.warnings {
            println!("  {} {warning}", self.yellow.apply_to("!"));
        }
    }

    /// Resumo curto: estratégia, etapas, qualidade e custo estimado.
    pub fn print_summary(&self, report: &JobReport) {
        let strategy = report
            .strategy
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "  {} job {} · {strategy} · {} ms",
            self.dim.apply_to("·"),
            report.job_id,
            report.metadata.processing_time_ms
        );
        println!(
            "  {} {}",
            self.dim.apply_to("·"),
            report.metadata.execution_order.join(" → ")
        );

        if let Some(summary) = &report.metadata.refinement {
            let status_style = match summary.status {
                CompletionStatus::FinalApproved => &self.green,
                CompletionStatus::QualityApproved | CompletionStatus::Unresolved => &self.yellow,
                _ => &self.red,
            };
            let score = summary
                .quality_score
                .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}"));
            println!(
                "  {} quality {score} after {}/{} refinements",
                status_style.apply_to(summary.status.to_string()),
                summary.iterations,
                summary.max_iterations
            );
        }

        let usage = report.metadata.total_usage();
        if usage.total_calls() == 0 {
            return;
        }
        let calls = ModelTier::ALL
            .iter()
            .map(|tier| format!("{tier} {}", usage.calls_for(*tier)))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {} calls: {calls} · est. ${:.4} (saved ${:.4})",
            self.dim.apply_to("·"),
            usage.total_cost,
            usage.cost_saved
        );
    }

    /// Imprime o relatório de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, report: &JobReport) -> Result<()> {
        let style = if report.is_success() {
            &self.green
        } else {
            &self.red
        };
        println!();
        println!("{}", style.apply_to("─── Audit Report ───"));
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }
}

/// Lista os tipos de documento e as seções de cada template embutido.
pub fn print_templates(types: &[DocumentType]) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    for document_type in types {
        let template = Template::builtin(*document_type);
        println!("{}", bold.apply_to(document_type.as_str()));
        for (i, section) in template.sections.iter().enumerate() {
            println!(
                "  {}. {} {}",
                i + 1,
                section.title,
                dim.apply_to(format!("({})", section.id))
            );
        }
    }
}
