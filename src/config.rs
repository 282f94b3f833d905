//! Configuração do brieflow carregada a partir de `brieflow.toml`.
//!
//! A struct [`BrieflowConfig`] agrupa os parâmetros de redação paralela, do
//! pipeline de refinamento, de preços por nível de modelo e de logging.
//! Valores ausentes no arquivo usam defaults sensíveis. As variáveis de
//! ambiente `BRIEFLOW_MAX_PARALLEL` e `BRIEFLOW_MAX_ITERATIONS` têm
//! precedência sobre o arquivo.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::router::ModelTier;

/// Configuração de nível superior carregada de `brieflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrieflowConfig {
    #[serde(default)]
    pub drafting: DraftingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parâmetros da divisão de tarefas e dos workers de redação.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftingConfig {
    /// Máximo de workers de redação executando em paralelo.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Abaixo deste número de caracteres um rascunho é considerado malformado.
    #[serde(default = "default_min_draft_chars")]
    pub min_draft_chars: usize,

    /// Média de caracteres por token usada nas estimativas de tamanho.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

/// Limiares e orçamento de iterações do pipeline de refinamento.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Limiar do portão de qualidade (0–100).
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Limiar do portão final (0–100).
    #[serde(default = "default_final_threshold")]
    pub final_threshold: f64,

    /// Máximo de passes de refinamento por job.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub tiers: NodeTiers,
}

/// Nível de modelo usado por cada nó do pipeline que chama um modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTiers {
    #[serde(default = "tier_sonnet")]
    pub generation: ModelTier,
    #[serde(default = "tier_haiku")]
    pub basic_refinement: ModelTier,
    #[serde(default = "tier_haiku")]
    pub quality_analysis: ModelTier,
    #[serde(default = "tier_sonnet")]
    pub refinement: ModelTier,
    #[serde(default = "tier_opus")]
    pub final_refinement: ModelTier,
}

/// Custo estimado em USD por 1.000 tokens, por nível de modelo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_haiku_price")]
    pub haiku: f64,
    #[serde(default = "default_sonnet_price")]
    pub sonnet: f64,
    #[serde(default = "default_opus_price")]
    pub opus: f64,
}

fn default_max_parallel() -> usize {
    4
}

fn default_min_draft_chars() -> usize {
    120
}

fn default_chars_per_token() -> usize {
    4
}

fn default_quality_threshold() -> f64 {
    80.0
}

fn default_final_threshold() -> f64 {
    90.0
}

fn default_max_iterations() -> u32 {
    3
}

fn tier_haiku() -> ModelTier {
    ModelTier::Haiku
}

fn tier_sonnet() -> ModelTier {
    ModelTier::Sonnet
}

fn tier_opus() -> ModelTier {
    ModelTier::Opus
}

fn default_haiku_price() -> f64 {
    0.001
}

fn default_sonnet_price() -> f64 {
    0.003
}

fn default_opus_price() -> f64 {
    0.015
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            min_draft_chars: default_min_draft_chars(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            final_threshold: default_final_threshold(),
            max_iterations: default_max_iterations(),
            tiers: NodeTiers::default(),
        }
    }
}

impl Default for NodeTiers {
    fn default() -> Self {
        Self {
            generation: tier_sonnet(),
            basic_refinement: tier_haiku(),
            quality_analysis: tier_haiku(),
            refinement: tier_sonnet(),
            final_refinement: tier_opus(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            haiku: default_haiku_price(),
            sonnet: default_sonnet_price(),
            opus: default_opus_price(),
        }
    }
}

impl PricingConfig {
    /// Custo estimado de `tokens` tokens no nível informado.
    pub fn cost(&self, tier: ModelTier, tokens: usize) -> f64 {
        let per_thousand = match tier {
            ModelTier::Haiku => self.haiku,
            ModelTier::Sonnet => self.sonnet,
            ModelTier::Opus => self.opus,
        };
        per_thousand * tokens as f64 / 1000.0
    }
}

impl BrieflowConfig {
    /// Carrega a configuração de `brieflow.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("brieflow.toml"))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(ConfigError::from)?;
            toml::from_str::<BrieflowConfig>(&contents).map_err(ConfigError::from)?
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo.
        if let Ok(value) = std::env::var("BRIEFLOW_MAX_PARALLEL")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.drafting.max_parallel = parsed;
        }
        if let Ok(value) = std::env::var("BRIEFLOW_MAX_ITERATIONS")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.pipeline.max_iterations = parsed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drafting.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "drafting.max_parallel must be at least 1".into(),
            ));
        }
        if self.drafting.chars_per_token == 0 {
            return Err(ConfigError::Invalid(
                "drafting.chars_per_token must be at least 1".into(),
            ));
        }
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.pipeline.quality_threshold) || !in_range(self.pipeline.final_threshold) {
            return Err(ConfigError::Invalid(
                "pipeline thresholds must be between 0 and 100".into(),
            ));
        }
        if self.pipeline.final_threshold < self.pipeline.quality_threshold {
            return Err(ConfigError::Invalid(format!(
                "pipeline.final_threshold ({}) is below pipeline.quality_threshold ({})",
                self.pipeline.final_threshold, self.pipeline.quality_threshold
            )));
        }
        Ok(())
    }
}
