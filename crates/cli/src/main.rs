//! Relevance workbench CLI
//!
//! Loads experiment results from the search backend and prints them.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod render;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use relevance_client::{create_search_backend, Delivery, ExperimentResultsLoader};
use relevance_core::config::Config;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "relevance")]
#[command(about = "Inspect search relevance experiments and their results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the results of one experiment
    Report {
        /// Experiment id
        experiment_id: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the most recent experiments
    Experiments {
        /// Maximum number of experiments to list
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let loader = create_loader(cli.config.as_deref())?;
    let liveness = CancellationToken::new();
    spawn_interrupt_handler(liveness.clone());

    match cli.command {
        Commands::Report {
            experiment_id,
            json,
        } => report(&loader, &experiment_id, json, &liveness).await,
        Commands::Experiments { limit } => list(&loader, limit, &liveness).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "relevance_core={level},relevance_client={level},relevance={level}"
        ))
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn create_loader(config_path: Option<&Path>) -> Result<ExperimentResultsLoader> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate()?;
    debug!("Using configuration: {config:?}");

    let backend = create_search_backend(&config.backend)?;
    Ok(ExperimentResultsLoader::new(backend, config))
}

/// Cancel in-flight loads on Ctrl+C
fn spawn_interrupt_handler(liveness: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning in-flight requests");
            liveness.cancel();
        }
    });
}

/// Unwrap a delivery; an abandoned load fails so the exit status shows it
fn delivered<T>(delivery: Delivery<T>) -> Result<T> {
    match delivery {
        Delivery::Ready(value) => Ok(value),
        Delivery::Disposed => Err(anyhow!("Interrupted before results were delivered")),
    }
}

async fn report(
    loader: &ExperimentResultsLoader,
    experiment_id: &str,
    json: bool,
    liveness: &CancellationToken,
) -> Result<()> {
    info!("Loading experiment {experiment_id}");

    let outcome = delivered(loader.load_report(experiment_id, liveness).await?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome.into_result() {
        Ok(report) => {
            print!("{}", render::report(&report));
            Ok(())
        }
        Err(errors) => {
            eprint!("{}", render::field_errors(&errors));
            Err(anyhow!(
                "Experiment {experiment_id} has {} invalid field(s)",
                errors.len()
            ))
        }
    }
}

async fn list(
    loader: &ExperimentResultsLoader,
    limit: Option<usize>,
    liveness: &CancellationToken,
) -> Result<()> {
    let outcome = delivered(loader.list_experiments(limit, liveness).await?)?;

    match outcome.into_result() {
        Ok(experiments) => {
            if experiments.is_empty() {
                println!("No experiments found.");
            } else {
                print!("{}", render::experiment_table(&experiments));
            }
            Ok(())
        }
        Err(errors) => {
            eprint!("{}", render::field_errors(&errors));
            Err(anyhow!("{} invalid field(s) in experiment list", errors.len()))
        }
    }
}
