//! Structured logging via `tracing`.
//!
//! Filter precedence: `BRIEFLOW_LOG` env var, then the config level (with
//! per-module overrides). Format precedence: `BRIEFLOW_LOG_FORMAT`, then config.
//! Logs go to stderr so command output on stdout stays clean.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// Colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let base = Registry::default().with(filter);

    // Already-installed subscriber is not an error; tests and embedders may
    // set their own.
    let _ = if format == "json" {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .try_init()
    } else {
        base.with(
            fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(config.color)
                .with_writer(std::io::stderr),
        )
        .try_init()
    };

    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env("BRIEFLOW_LOG") {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.modules {
        let directive = format!("{module}={level}");
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("invalid log directive: {e}")))?,
        );
    }
    Ok(filter)
}

fn determine_format(config: &LoggingConfig) -> Result<String, ConfigError> {
    if let Ok(format) = std::env::var("BRIEFLOW_LOG_FORMAT")
        && (format == "json" || format == "text")
    {
        return Ok(format);
    }

    match config.format.as_str() {
        "json" | "text" => Ok(config.format.clone()),
        other => Err(ConfigError::Invalid(format!(
            "invalid log format: {other} (must be 'json' or 'text')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "text");
        assert!(config.color);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn rejects_unknown_format() {
        let config = LoggingConfig {
            format: "yaml".into(),
            ..Default::default()
        };
        if std::env::var("BRIEFLOW_LOG_FORMAT").is_err() {
            assert!(determine_format(&config).is_err());
        }
    }

    #[test]
    fn rejects_bad_module_directive() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("brieflow::pipeline".into(), "loud".into());
        if std::env::var("BRIEFLOW_LOG").is_err() {
            assert!(build_env_filter(&config).is_err());
        }
    }
}
