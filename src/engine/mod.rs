mod cancel;
mod executor;
mod job;
mod pipeline;
mod pool;
mod scratch;
mod script;

pub use cancel::{CancellationController, signal_process_group, terminate_job};
pub use executor::ScriptRunner;
pub use job::{JobDescriptor, JobMode, JobOutput, JobRunner};
pub use pipeline::{flatten, Pipeline, PipelineReport, Plan};
pub use pool::{FailurePolicy, WorkerPool, MAX_WORKERS};
pub use scratch::ScratchDir;
pub use script::{ScriptBuilder, TaskScript};
