// src/app.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{
    CancellationController, Pipeline, PipelineReport, Plan, ScratchDir, ScriptBuilder,
    ScriptRunner, WorkerPool,
};
use crate::error::{ParallelGetError, ParallelGetResult};
use crate::target::{Target, TargetSource};

/// What a single invocation should do
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after discovery and return the plan
    pub list_only: bool,
    /// Save the discovered plan before executing it
    pub plan_path: Option<PathBuf>,
    /// Parent directory for the scratch directory; system temp dir if unset
    pub scratch_parent: Option<PathBuf>,
}

/// Result of a run
#[derive(Debug)]
pub enum RunOutcome {
    Listed(Plan),
    Completed(PipelineReport),
}

/// Main application struct that wires configuration to the pipeline
pub struct App {
    config: Config,
    controller: CancellationController,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, controller: CancellationController) -> Self {
        Self { config, controller }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the installation root so generated scripts can `cd` into it
    fn install_root(&self) -> ParallelGetResult<PathBuf> {
        let root = &self.config.scripts.root;
        std::fs::canonicalize(root).map_err(|e| ParallelGetError::FileError {
            path: root.clone(),
            message: format!("Invalid installation root: {}", e),
        })
    }

    /// Read targets, then discover and execute them inside one scratch scope
    pub async fn run(&self, options: &RunOptions) -> ParallelGetResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", id = %run_id);
        self.run_inner(options).instrument(span).await
    }

    async fn run_inner(&self, options: &RunOptions) -> ParallelGetResult<RunOutcome> {
        let start_time = Instant::now();
        let root = self.install_root()?;

        let mut config = self.config.clone();
        config.scripts.root = root.clone();
        let source = TargetSource::new(config.definitions_path(), config.targets.prefixes.clone());
        let targets = source.load()?;

        let runner = ScriptRunner::new(
            ScriptBuilder::new(&root, &config.scripts.library),
            config.scripts.interpreter.clone(),
            config.scripts.dry_run_var.clone(),
            config.kill_grace(),
        );
        let pool = WorkerPool::new(config.pool_ceiling(), config.failure_policy(), self.controller.token());

        let scratch = ScratchDir::create(options.scratch_parent.as_deref())?;
        let pipeline = Pipeline::new(Arc::new(runner), pool, scratch.path());
        info!("Running {} targets from {}", targets.len(), source.path().display());

        let outcome = Self::run_pipeline(&pipeline, &targets, options, start_time).await;

        // Cleanup happens on every path; a cleanup error only wins over success
        match (outcome, scratch.close()) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Scratch cleanup also failed: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        pipeline: &Pipeline,
        targets: &[Target],
        options: &RunOptions,
        start_time: Instant,
    ) -> ParallelGetResult<RunOutcome> {
        let plan = pipeline.discover(targets).await?;
        if let Some(path) = &options.plan_path {
            plan.save(path)?;
        }
        if options.list_only {
            return Ok(RunOutcome::Listed(plan));
        }

        pipeline
            .run_plan(targets.len(), plan, start_time)
            .await
            .map(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_for(root: &Path) -> Config {
        let mut config = Config::default();
        config.scripts.root = root.to_path_buf();
        config.scripts.library = PathBuf::from("lib.sh");
        config.scripts.dry_run_var = "APP_TEST_DRY_RUN".to_string();
        config.targets.prefixes = vec!["fetch_all".to_string()];
        config
    }

    fn write_root(library: &str, definitions: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("lib.sh"), library).unwrap();
        std::fs::write(root.path().join("get"), definitions).unwrap();
        root
    }

    fn scratch_entries(parent: &Path) -> usize {
        std::fs::read_dir(parent).unwrap().count()
    }

    #[tokio::test]
    async fn test_list_only_returns_plan_and_cleans_up() {
        let root = write_root(
            "fetch_all() { echo \"fetch $1-1\"; echo \"fetch $1-2\"; }\n",
            "fetch_all a\nfetch_all b\nignored\n",
        );
        let scratch_parent = tempfile::tempdir().unwrap();
        let app = App::new(config_for(root.path()), CancellationController::new());

        let outcome = app
            .run(&RunOptions {
                list_only: true,
                plan_path: None,
                scratch_parent: Some(scratch_parent.path().to_path_buf()),
            })
            .await
            .unwrap();

        match outcome {
            RunOutcome::Listed(plan) => {
                assert_eq!(plan.items, vec!["fetch a-1", "fetch a-2", "fetch b-1", "fetch b-2"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(scratch_entries(scratch_parent.path()), 0);
    }

    #[tokio::test]
    async fn test_failure_still_removes_scratch() {
        let root = write_root("fetch_all() { exit 1; }\n", "fetch_all a\n");
        let scratch_parent = tempfile::tempdir().unwrap();
        let app = App::new(config_for(root.path()), CancellationController::new());

        let err = app
            .run(&RunOptions {
                scratch_parent: Some(scratch_parent.path().to_path_buf()),
                ..RunOptions::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ParallelGetError::JobFailed { .. }));
        assert_eq!(scratch_entries(scratch_parent.path()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_removes_scratch() {
        let root = write_root("fetch_all() { sleep 30; }\n", "fetch_all a\nfetch_all b\n");
        let scratch_parent = tempfile::tempdir().unwrap();
        let controller = CancellationController::new();
        let app = App::new(config_for(root.path()), controller.clone());

        let trigger = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = app
            .run(&RunOptions {
                scratch_parent: Some(scratch_parent.path().to_path_buf()),
                ..RunOptions::default()
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(scratch_entries(scratch_parent.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_root_is_reported() {
        let app = App::new(config_for(Path::new("/nonexistent/root")), CancellationController::new());

        let err = app.run(&RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, ParallelGetError::FileError { .. }));
    }
}
