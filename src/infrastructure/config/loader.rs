use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_rounds: {0}. Must be at least 1")]
    InvalidMaxRounds(u32),

    #[error("Invalid round_timeout_secs: {0}. Must be at least 1")]
    InvalidRoundTimeout(u64),

    #[error("Invalid max_concurrency: {0}. Must be between 1 and 64")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Compiler command cannot be empty")]
    EmptyCompilerCommand,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mapsmith/config.yaml (project config)
    /// 3. .mapsmith/local.yaml (project local overrides, optional)
    /// 4. Environment variables (MAPSMITH_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config = Self::figment(None)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with `path` in place of the project config file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config = Self::figment(Some(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = match file {
            Some(path) => figment.merge(Yaml::file(path)),
            None => figment
                .merge(Yaml::file(".mapsmith/config.yaml"))
                .merge(Yaml::file(".mapsmith/local.yaml")),
        };
        figment.merge(Env::prefixed("MAPSMITH_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let orchestration = &config.orchestration;
        if orchestration.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds(orchestration.max_rounds));
        }
        if orchestration.round_timeout_secs == 0 {
            return Err(ConfigError::InvalidRoundTimeout(orchestration.round_timeout_secs));
        }
        if orchestration.max_concurrency == 0 || orchestration.max_concurrency > 64 {
            return Err(ConfigError::InvalidMaxConcurrency(orchestration.max_concurrency));
        }

        if config.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_second));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.compiler.command.is_empty() || config.compiler.command[0].trim().is_empty() {
            return Err(ConfigError::EmptyCompilerCommand);
        }

        for suffix in config
            .filters
            .transformer_exclude_suffixes
            .iter()
            .chain(&config.filters.collector_include_suffixes)
        {
            if suffix.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "shape filter suffixes cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
