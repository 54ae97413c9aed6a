//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::ConfigFile;

/// Environment variable prefix
const ENV_PREFIX: &str = "UNIT_RUNNER";

/// Configuration overrides read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// From UNIT_RUNNER_PARALLELISE
    pub parallelise: Option<bool>,
    /// From UNIT_RUNNER_AFFINITY_TRAIT
    pub affinity_trait: Option<String>,
    /// From UNIT_RUNNER_ARRANGEMENT_FAILURE_COUNTS_AS_FAILED
    pub arrangement_failure_counts_as_failed: Option<bool>,
    /// From UNIT_RUNNER_MAX_PARALLELISM
    pub max_parallelism: Option<usize>,
    /// From UNIT_RUNNER_CONFIG
    pub config_file: Option<String>,
    /// From UNIT_RUNNER_FORMAT
    pub format: Option<String>,
    /// From UNIT_RUNNER_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            parallelise: get_env_bool("PARALLELISE"),
            affinity_trait: get_env("AFFINITY_TRAIT"),
            arrangement_failure_counts_as_failed: get_env_bool(
                "ARRANGEMENT_FAILURE_COUNTS_AS_FAILED",
            ),
            max_parallelism: get_env_parse("MAX_PARALLELISM"),
            config_file: get_env("CONFIG"),
            format: get_env("FORMAT"),
            log_level: get_env("LOG_LEVEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.parallelise.is_some()
            || self.affinity_trait.is_some()
            || self.arrangement_failure_counts_as_failed.is_some()
            || self.max_parallelism.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
            || self.log_level.is_some()
    }

    /// Apply the overrides that are set on top of a loaded config file
    pub fn apply(&self, config: &mut ConfigFile) {
        if let Some(parallelise) = self.parallelise {
            config.run.parallelise = parallelise;
        }
        if let Some(name) = &self.affinity_trait {
            config.run.affinity_trait_name = if name.is_empty() {
                None
            } else {
                Some(name.clone())
            };
        }
        if let Some(value) = self.arrangement_failure_counts_as_failed {
            config.run.test_configuration.arrangement_failure_counts_as_failed = value;
        }
        if let Some(max) = self.max_parallelism {
            config.run.max_degree_of_parallelism = Some(max);
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}
