//! unit-runner - test execution engine CLI
//!
//! Runs the built-in demonstration suite through the execution engine,
//! sequentially, fully in parallel, or partitioned by a trait.
//!
//! ## Usage
//!
//! ```bash
//! # Run every test in parallel
//! unit-runner run
//!
//! # Never run two tests of the same category at once
//! unit-runner run --affinity-trait Category
//!
//! # One test at a time, JSON report saved to a file
//! unit-runner run --sequential --format json --output report.json
//!
//! # List tests and their traits
//! unit-runner list --detailed
//!
//! # Write an example configuration file
//! unit-runner config init
//! ```

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use unit_runner::cli::{self, Args, Command};
use unit_runner::config::{ConfigFile, EnvConfig};
use unit_runner::demos::{self, CATEGORY_TRAIT};
use unit_runner::executor::{RunError, TestExecutor};
use unit_runner::output::{OutputFormat, ReportCollector, ReportFormatter};
use unit_runner::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = args
        .log_level
        .as_deref()
        .or(env.log_level.as_deref())
        .and_then(LogLevel::from_str)
        .unwrap_or_default();
    init_logger(level);

    match args.command {
        Command::Run(run_args) => {
            if !run_tests(run_args, &env).await? {
                std::process::exit(1);
            }
        }
        Command::List(list_args) => {
            list_tests(list_args);
        }
        Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
    }

    Ok(())
}

/// File configuration with environment overrides applied
fn load_config(path: Option<&str>, env: &EnvConfig) -> Result<ConfigFile> {
    let mut config = match path.or(env.config_file.as_deref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    env.apply(&mut config);
    Ok(config)
}

/// Returns whether every test passed.
async fn run_tests(args: cli::RunArgs, env: &EnvConfig) -> Result<bool> {
    let mut config = load_config(args.config.as_deref(), env)?;

    if args.sequential {
        config.run.parallelise = false;
    }
    if let Some(name) = args.affinity_trait {
        config.run.affinity_trait_name = Some(name);
    }
    if args.arrangement_failure_counts_as_failed {
        config.run.test_configuration.arrangement_failure_counts_as_failed = true;
    }
    if let Some(max) = args.max_parallelism {
        config.run.max_degree_of_parallelism = Some(max);
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.validate()?;

    let format = OutputFormat::from_str(&config.format)
        .ok_or_else(|| anyhow!("Unknown output format: {}", config.format))?;

    let collector = ReportCollector::new();
    let containers: Vec<_> = demos::suite()
        .into_iter()
        .filter(|demo| {
            args.filter
                .as_deref()
                .map_or(true, |filter| demo.name().contains(filter))
        })
        .map(|demo| {
            collector
                .register(demo.metadata.clone(), move || Ok(demo.create()))
                .into_container()
        })
        .collect();

    info!(
        "Running {} tests ({})",
        containers.len(),
        config.run.strategy()
    );

    let executor = Arc::new(TestExecutor::new());
    let interrupt = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling test run");
                executor.cancel();
            }
        })
    };

    let outcome = executor.run_tests(containers, config.run).await;
    interrupt.abort();

    let report = collector.report();
    let formatter = ReportFormatter::new(format);
    println!("{}", formatter.format_report(&report)?);

    if let Some(path) = &args.output {
        formatter.write_to(path, &report)?;
        info!("Report saved to {}", path);
    }

    match outcome {
        Ok(summary) => Ok(summary.is_all_passed()),
        Err(RunError::Cancelled) => {
            warn!("Test run cancelled with {} tests not run", report.not_run);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn list_tests(args: cli::ListArgs) {
    let tests = demos::suite();

    println!("\nBuilt-in tests ({} total)\n", tests.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut categories: Vec<&str> = Vec::new();
    for test in &tests {
        let category = test.metadata.trait_value(CATEGORY_TRAIT).unwrap_or("Uncategorised");
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    for category in categories {
        println!("\n{category} Tests:");
        println!("──────────────────────────────────────────────────────────────────────");

        let in_category = tests.iter().filter(|test| {
            test.metadata.trait_value(CATEGORY_TRAIT).unwrap_or("Uncategorised") == category
        });
        for test in in_category {
            if args.detailed {
                let traits: Vec<String> = test.metadata.traits.iter().map(ToString::to_string).collect();
                println!("  {:45} [{}]", test.name(), traits.join(", "));
            } else {
                println!("  {}", test.name());
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { config, format } => {
            let config = load_config(config.as_deref(), env)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
            println!("# Strategy: {}", config.run.strategy());
        }

        cli::ConfigAction::Validate { file } => {
            let path = file.unwrap_or_else(|| {
                ConfigFile::find()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| "./unit-runner.yaml".to_string())
            });

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
