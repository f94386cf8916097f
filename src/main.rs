// src/main.rs
use std::path::PathBuf;
use std::process::exit;
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use parallel_get::app::{App, RunOptions, RunOutcome};
use parallel_get::config::Config;
use parallel_get::engine::CancellationController;
use parallel_get::error::ParallelGetError;

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "parallel-get")]
#[command(about = "Discover and fetch every target of a definitions file in parallel")]
#[command(version)]
struct Args {
    #[arg(long, short, help = "Additional configuration file")]
    config: Option<PathBuf>,

    #[arg(long, short, help = "Installation root the task scripts run in")]
    root: Option<PathBuf>,

    #[arg(long, short, help = "Definitions file to read targets from")]
    definitions: Option<PathBuf>,

    #[arg(long, short, help = "Maximum concurrent jobs (1-16)")]
    jobs: Option<usize>,

    #[arg(long, help = "Run every job even if some fail")]
    keep_going: bool,

    #[arg(long, help = "Only discover work items and print them")]
    list: bool,

    #[arg(long, help = "Save discovered work items as JSON")]
    plan: Option<PathBuf>,

    #[arg(long, short, help = "Enable debug logging")]
    verbose: bool,
}

impl Args {
    /// CLI flags take precedence over every configuration layer
    fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.scripts.root = root.clone();
        }
        if let Some(definitions) = &self.definitions {
            config.targets.definitions = definitions.clone();
        }
        if let Some(jobs) = self.jobs {
            config.pool.max_concurrency = jobs;
        }
        if self.keep_going {
            config.pool.fail_fast = false;
        }
    }
}

/// Log to stderr; RUST_LOG overrides the verbosity flag
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            exit(EXIT_FAILURE);
        }
    };
    args.apply(&mut config);

    let controller = CancellationController::new();
    let interrupt = controller.install_interrupt_handler();

    let app = App::new(config, controller);
    let options = RunOptions {
        list_only: args.list,
        plan_path: args.plan.clone(),
        scratch_parent: None,
    };

    // The scratch directory is gone by the time run returns
    let result = app.run(&options).await;
    interrupt.abort();

    match result {
        Ok(RunOutcome::Listed(plan)) => {
            for item in &plan.items {
                println!("{}", item);
            }
            if !plan.failed_targets.is_empty() {
                warn!("{} targets failed discovery", plan.failed_targets.len());
                exit(EXIT_FAILURE);
            }
        }
        Ok(RunOutcome::Completed(report)) => {
            if !report.is_success() {
                for failure in &report.failures {
                    error!("Failed: {}", failure);
                }
                exit(EXIT_FAILURE);
            }
            info!("All {} jobs completed", report.jobs);
        }
        Err(ParallelGetError::Cancelled) => {
            warn!("Interrupted");
            exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            exit(EXIT_FAILURE);
        }
    }

    Ok(())
}
