// src/engine/pipeline.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::error::{ParallelGetError, ParallelGetResult};
use crate::target::Target;
use super::job::{JobDescriptor, JobMode, JobOutput, JobRunner};
use super::pool::WorkerPool;

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub targets: usize,
    pub jobs: usize,
    /// Targets and jobs that failed; only populated under `KeepGoing`
    pub failures: Vec<String>,
    pub duration: Duration,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Work items discovered in phase 1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub items: Vec<String>,
    /// Targets whose discovery failed; only populated under `KeepGoing`
    pub failed_targets: Vec<String>,
}

impl Plan {
    /// Save the plan as JSON
    pub fn save(&self, path: &Path) -> ParallelGetResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ParallelGetError::SerializationError(format!("Failed to serialize plan: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ParallelGetError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to write file: {}", e),
            })?;

        info!("Saved {} work items to {}", self.items.len(), path.display());
        Ok(())
    }

    /// Load a plan saved with `save`
    pub fn load(path: &Path) -> ParallelGetResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParallelGetError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to read file: {}", e),
            })?;

        serde_json::from_str(&content)
            .map_err(|e| ParallelGetError::SerializationError(format!("Failed to parse JSON: {}", e)))
    }
}

/// Split every discovery result into lines, keeping order and duplicates
pub fn flatten<S: AsRef<str>>(outputs: &[S]) -> Vec<String> {
    outputs
        .iter()
        .flat_map(|output| output.as_ref().lines())
        .map(str::to_string)
        .collect()
}

/// Chains discovery and execution over one worker pool
pub struct Pipeline {
    runner: Arc<dyn JobRunner>,
    pool: WorkerPool,
    scratch: PathBuf,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn JobRunner>, pool: WorkerPool, scratch: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            pool,
            scratch: scratch.into(),
        }
    }

    /// Run every instruction in `mode` on the pool
    async fn run_phase(
        &self,
        mode: JobMode,
        instructions: Vec<String>,
    ) -> ParallelGetResult<Vec<(String, ParallelGetResult<JobOutput>)>> {
        let descriptors: Vec<JobDescriptor> = instructions
            .iter()
            .map(|instruction| JobDescriptor::new(&self.scratch, instruction.as_str()))
            .collect();

        let runner = self.runner.clone();
        let results = self
            .pool
            .run(descriptors, move |job, cancel| {
                let runner = runner.clone();
                async move { runner.run(job, mode, cancel).await }
            })
            .await?;

        Ok(instructions.into_iter().zip(results).collect())
    }

    /// Phase 1: expand targets into work items
    pub async fn discover(&self, targets: &[Target]) -> ParallelGetResult<Plan> {
        info!("Discovery: {} targets", targets.len());

        let instructions = targets.iter().map(|t| t.instruction.clone()).collect();
        let mut outputs = Vec::with_capacity(targets.len());
        let mut failed_targets = Vec::new();

        for (instruction, result) in self.run_phase(JobMode::Discovery, instructions).await? {
            match result {
                Ok(output) => outputs.push(output.text().to_string()),
                Err(e) => {
                    warn!("Skipping target {}: {}", instruction, e);
                    failed_targets.push(instruction);
                }
            }
        }

        let items = flatten(&outputs);
        info!("Discovery produced {} work items", items.len());

        Ok(Plan { items, failed_targets })
    }

    /// Phase 2: perform every work item, returning the ones that failed
    pub async fn execute(&self, items: Vec<String>) -> ParallelGetResult<Vec<String>> {
        info!("Execution: {} work items", items.len());

        let mut failures = Vec::new();
        for (instruction, result) in self.run_phase(JobMode::Execution, items).await? {
            if let Err(e) = result {
                warn!("Work item failed {}: {}", instruction, e);
                failures.push(instruction);
            }
        }
        Ok(failures)
    }

    /// Discovery, then execution of everything discovered
    pub async fn run(&self, targets: &[Target]) -> ParallelGetResult<PipelineReport> {
        let start_time = Instant::now();

        let plan = self.discover(targets).await?;
        self.run_plan(targets.len(), plan, start_time).await
    }

    /// Execute an already discovered plan
    pub async fn run_plan(&self, targets: usize, plan: Plan, start_time: Instant) -> ParallelGetResult<PipelineReport> {
        let jobs = plan.items.len();
        let mut failures = plan.failed_targets;
        failures.extend(self.execute(plan.items).await?);

        let report = PipelineReport {
            targets,
            jobs,
            failures,
            duration: start_time.elapsed(),
        };

        info!(
            "Finished {} jobs from {} targets in {:?} ({} failed)",
            report.jobs, report.targets, report.duration, report.failures.len()
        );
        Ok(report)
    }
}
