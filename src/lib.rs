pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod target;

// Re-export main types for easier access
pub use app::{App, RunOptions, RunOutcome};
pub use config::Config;
pub use engine::{
    CancellationController,
    FailurePolicy,
    JobMode,
    Pipeline,
    WorkerPool
};
pub use error::{ParallelGetError, ParallelGetResult};
pub use target::{Target, TargetSource};
