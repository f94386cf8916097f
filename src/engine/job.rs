// src/engine/job.rs
use std::fmt;
use std::path::PathBuf;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tokio_util::sync::CancellationToken;

use crate::error::ParallelGetResult;

/// One unit of work submitted to the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Scratch directory shared by every job of the run
    pub scratch: PathBuf,
    pub instruction: String,
}

impl JobDescriptor {
    pub fn new(scratch: impl Into<PathBuf>, instruction: impl Into<String>) -> Self {
        Self {
            scratch: scratch.into(),
            instruction: instruction.into(),
        }
    }
}

/// Which phase a job runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobMode {
    /// Report the work items without acting on them
    Discovery,
    /// Perform the action for real
    Execution,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Discovery => write!(f, "discovery"),
            JobMode::Execution => write!(f, "execution"),
        }
    }
}

/// Successful result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Captured stdout of a discovery job
    Text(String),
    /// An execution job that exited zero
    Completed,
}

impl JobOutput {
    /// The captured text, empty for execution results
    pub fn text(&self) -> &str {
        match self {
            JobOutput::Text(text) => text,
            JobOutput::Completed => "",
        }
    }
}

/// Runs a single job to completion or until cancelled
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(
        &self,
        job: JobDescriptor,
        mode: JobMode,
        cancel: CancellationToken,
    ) -> ParallelGetResult<JobOutput>;
}
