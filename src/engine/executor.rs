// src/engine/executor.rs
use std::os::unix::process::CommandExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ParallelGetError, ParallelGetResult};
use super::cancel::terminate_job;
use super::job::{JobDescriptor, JobMode, JobOutput, JobRunner};
use super::script::{ScriptBuilder, TaskScript};

/// Runs jobs as generated shell scripts in child processes
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    builder: ScriptBuilder,
    interpreter: String,
    dry_run_var: String,
    kill_grace: Duration,
}

impl ScriptRunner {
    pub fn new(
        builder: ScriptBuilder,
        interpreter: impl Into<String>,
        dry_run_var: impl Into<String>,
        kill_grace: Duration,
    ) -> Self {
        Self {
            builder,
            interpreter: interpreter.into(),
            dry_run_var: dry_run_var.into(),
            kill_grace,
        }
    }

    fn command(&self, script: &TaskScript, mode: JobMode) -> Command {
        let mut std_cmd = std::process::Command::new(&self.interpreter);
        std_cmd.arg(script.path())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            // own process group so cancellation can reach grandchildren
            .process_group(0);

        match mode {
            JobMode::Discovery => {
                std_cmd.env(&self.dry_run_var, "1").stdout(Stdio::piped());
            }
            JobMode::Execution => {
                std_cmd.env_remove(&self.dry_run_var).stdout(Stdio::null());
            }
        }

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Wait for the child, collecting stdout when it is piped
    async fn collect(child: &mut Child) -> std::io::Result<(ExitStatus, Vec<u8>)> {
        let mut stdout = Vec::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_end(&mut stdout).await?;
        }
        let status = child.wait().await?;
        Ok((status, stdout))
    }
}

#[async_trait]
impl JobRunner for ScriptRunner {
    async fn run(
        &self,
        job: JobDescriptor,
        mode: JobMode,
        cancel: CancellationToken,
    ) -> ParallelGetResult<JobOutput> {
        if cancel.is_cancelled() {
            return Err(ParallelGetError::Cancelled);
        }

        let script = self.builder.build(&job.scratch, &job.instruction)?;
        debug!("Running {} job {}: {}", mode, script.path().display(), job.instruction);

        let start_time = Instant::now();
        let mut child = self.command(&script, mode).spawn().map_err(|e| {
            ParallelGetError::LaunchError {
                program: self.interpreter.clone(),
                message: e.to_string(),
            }
        })?;
        let pgid = child.id();

        let finished = {
            let collect = Self::collect(&mut child);
            tokio::select! {
                res = collect => Some(res),
                _ = cancel.cancelled() => None,
            }
        };

        let (status, stdout) = match finished {
            Some(res) => res.map_err(|e| ParallelGetError::UnexpectedError(
                format!("Failed to wait for job {}: {}", job.instruction, e)
            ))?,
            None => {
                debug!("Cancelling job {}", job.instruction);
                terminate_job(&mut child, pgid, self.kill_grace).await;
                return Err(ParallelGetError::Cancelled);
            }
        };

        debug!("Job {} finished in {:?} with {}", job.instruction, start_time.elapsed(), status);

        if !status.success() {
            warn!("Job failed with {}: {}", status, job.instruction);
            return Err(ParallelGetError::JobFailed {
                instruction: job.instruction,
                status: status.to_string(),
            });
        }

        match mode {
            JobMode::Discovery => String::from_utf8(stdout)
                .map(JobOutput::Text)
                .map_err(|e| ParallelGetError::InvalidOutput {
                    instruction: job.instruction,
                    message: e.to_string(),
                }),
            JobMode::Execution => Ok(JobOutput::Completed),
        }
    }
}
