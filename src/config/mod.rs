//! Configuration module
//!
//! Run-level and per-test configuration, plus loading from files and the
//! environment.

mod env;
mod file;

pub use env::EnvConfig;
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::naming::{DefaultResultNaming, ResultNamingStrategy};

/// Settings that apply to the execution of individual tests.
///
/// Tests that declare overrides receive a private clone of this value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfiguration {
    /// Report arrangement failures as plain failures, for hosts without a
    /// third outcome.
    pub arrangement_failure_counts_as_failed: bool,

    #[serde(skip, default = "default_naming_strategy")]
    pub result_naming_strategy: Arc<dyn ResultNamingStrategy>,
}

fn default_naming_strategy() -> Arc<dyn ResultNamingStrategy> {
    Arc::new(DefaultResultNaming)
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            arrangement_failure_counts_as_failed: false,
            result_naming_strategy: default_naming_strategy(),
        }
    }
}

/// Settings for a whole test run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunConfiguration {
    /// Run tests concurrently
    pub parallelise: bool,

    /// Trait whose value keeps tests from running concurrently with each other
    #[serde(alias = "parallel_partitioning_trait")]
    pub affinity_trait_name: Option<String>,

    /// Upper bound on concurrently running tests (host parallelism when unset)
    pub max_degree_of_parallelism: Option<usize>,

    /// Settings applied to each test
    pub test_configuration: TestConfiguration,
}

impl Default for TestRunConfiguration {
    fn default() -> Self {
        Self {
            parallelise: true,
            affinity_trait_name: None,
            max_degree_of_parallelism: None,
            test_configuration: TestConfiguration::default(),
        }
    }
}

impl TestRunConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequential() -> Self {
        Self {
            parallelise: false,
            ..Self::default()
        }
    }

    pub fn with_parallelise(mut self, parallelise: bool) -> Self {
        self.parallelise = parallelise;
        self
    }

    pub fn with_affinity_trait(mut self, name: impl Into<String>) -> Self {
        self.affinity_trait_name = Some(name.into());
        self
    }

    pub fn with_max_degree_of_parallelism(mut self, max: usize) -> Self {
        self.max_degree_of_parallelism = Some(max);
        self
    }

    pub fn with_arrangement_failure_counts_as_failed(mut self, value: bool) -> Self {
        self.test_configuration.arrangement_failure_counts_as_failed = value;
        self
    }

    pub fn with_result_naming(mut self, strategy: impl ResultNamingStrategy + 'static) -> Self {
        self.test_configuration.result_naming_strategy = Arc::new(strategy);
        self
    }

    /// Strategy implied by these settings
    pub fn strategy(&self) -> ExecutionStrategy {
        if !self.parallelise {
            return ExecutionStrategy::Sequential;
        }

        match self.affinity_trait_name.as_deref() {
            Some(name) if !name.is_empty() => ExecutionStrategy::AffinityPartitioned(name.to_string()),
            _ => ExecutionStrategy::Parallel,
        }
    }
}

/// How a run schedules its tests
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One test at a time, in input order
    Sequential,
    /// Every test may run concurrently with every other
    Parallel,
    /// Tests sharing a value of the named trait never overlap
    AffinityPartitioned(String),
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
            ExecutionStrategy::AffinityPartitioned(name) => {
                write!(f, "parallel, partitioned by trait '{name}'")
            }
        }
    }
}
