//! Interface de linha de comando do brieflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, templates, demo)
//! e flags globais (--config, --verbose). Todos os subcomandos usam os
//! colaboradores offline de [`crate::offline`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::BrieflowConfig;
use crate::document::DocumentType;
use crate::offline::{self, SAMPLE_MATTER};
use crate::orchestrator::{JobConfig, JobFlags, Strategy};
use crate::ui::{self, JobProgress};
use crate::unit::TracingAuditSink;

/// brieflow: redação de documentos em múltiplas seções com portões de qualidade.
#[derive(Debug, Parser)]
#[command(name = "brieflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho alternativo para o arquivo de configuração.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Estratégia de redação aceita pela CLI, mapeada para [`Strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Escolhe conforme o tamanho do template e o paralelismo.
    Auto,
    /// Um único worker sobre o template inteiro.
    Sequential,
    /// Divide, redige em paralelo e mescla.
    Parallel,
}

impl StrategyArg {
    pub fn into_strategy(self) -> Option<Strategy> {
        match self {
            StrategyArg::Auto => None,
            StrategyArg::Sequential => Some(Strategy::Sequential),
            StrategyArg::Parallel => Some(Strategy::Parallel),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um job de redação a partir de um arquivo JSON do caso.
    Run {
        /// Tipo de documento (ex.: demand-letter, motion).
        #[arg(long = "type")]
        document_type: String,

        /// Arquivo JSON com partes e campos do caso.
        #[arg(long)]
        input: String,

        /// Caminho do documento markdown gerado.
        #[arg(long)]
        output: String,

        #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
        strategy: StrategyArg,

        /// Máximo de workers de redação em paralelo.
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Máximo de passes de refinamento.
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Pula o pipeline de refinamento.
        #[arg(long, default_value_t = false)]
        no_refine: bool,

        /// Imprime o relatório completo de auditoria em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Lista os tipos de documento e suas seções.
    Templates,

    /// Executa um job de demonstração e imprime o relatório de auditoria.
    Demo,
}

/// Carrega a configuração respeitando `--config`.
pub fn load_config(cli: &Cli) -> Result<BrieflowConfig> {
    let mut config = match &cli.config {
        Some(path) => BrieflowConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BrieflowConfig::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".into();
    }
    Ok(config)
}

/// Executa o subcomando. Retorna `false` quando o job falhou.
pub async fn execute(command: Command, mut config: BrieflowConfig) -> Result<bool> {
    match command {
        Command::Templates => {
            ui::print_templates(&DocumentType::ALL);
            Ok(true)
        }
        Command::Run {
            document_type,
            input,
            output,
            strategy,
            max_parallel,
            max_iterations,
            no_refine,
            json,
        } => {
            if let Some(n) = max_iterations {
                config.pipeline.max_iterations = n;
            }
            config.validate()?;

            let job = JobConfig::new(document_type, input, output).with_flags(JobFlags {
                strategy: strategy.into_strategy(),
                max_parallel,
                refine: !no_refine,
            });
            run_job(&config, &job, json).await
        }
        Command::Demo => {
            let dir = std::env::temp_dir().join("brieflow-demo");
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
            let input = dir.join("matter.json");
            tokio::fs::write(&input, SAMPLE_MATTER)
                .await
                .with_context(|| format!("writing {}", input.display()))?;

            let job = JobConfig::new(
                DocumentType::DemandLetter.as_str(),
                input.to_string_lossy(),
                dir.join("demand_letter.md").to_string_lossy(),
            );
            run_job(&config, &job, true).await
        }
    }
}

async fn run_job(config: &BrieflowConfig, job: &JobConfig, json: bool) -> Result<bool> {
    let orchestrator = offline::orchestrator(config, Arc::new(TracingAuditSink));
    let progress = JobProgress::start(&format!("{} → {}", job.document_type, job.output));
    let report = orchestrator.run_job(job).await;
    progress.complete(&report);
    if json {
        progress.print_audit(&report)?;
    } else {
        progress.print_summary(&report);
    }
    Ok(report.is_success())
}
