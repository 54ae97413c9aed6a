//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Test runner with sequential, parallel and affinity-partitioned execution
#[derive(Parser, Debug)]
#[command(name = "unit-runner")]
#[command(version)]
#[command(about = "Run tests sequentially, in parallel, or partitioned by trait")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the built-in test suite
    Run(RunArgs),

    /// List the built-in tests and their traits
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults to the standard locations)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Run tests one at a time
    #[arg(short, long)]
    pub sequential: bool,

    /// Never run tests sharing a value of this trait at the same time
    #[arg(short, long)]
    pub affinity_trait: Option<String>,

    /// Report arrangement failures as plain failures
    #[arg(long)]
    pub arrangement_failure_counts_as_failed: bool,

    /// Maximum number of tests running at once
    #[arg(short, long)]
    pub max_parallelism: Option<usize>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save the report to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Only run tests whose name contains this text
    #[arg(short = 'n', long)]
    pub filter: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show each test's traits
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./unit-runner.yaml")]
        output: String,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Configuration file (defaults to the standard locations)
        #[arg(short, long)]
        config: Option<String>,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
}
