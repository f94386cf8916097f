use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelGetError {
    #[error("Script error: {path:?} - {message}")]
    ScriptError {
        path: PathBuf,
        message: String,
    },

    #[error("Failed to launch {program}: {message}")]
    LaunchError {
        program: String,
        message: String,
    },

    #[error("Job failed ({status}): {instruction}")]
    JobFailed {
        instruction: String,
        status: String,
    },

    #[error("Job produced invalid output: {instruction} - {message}")]
    InvalidOutput {
        instruction: String,
        message: String,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl ParallelGetError {
    /// True for the whole-run abort, as opposed to a job error
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ParallelGetError::Cancelled)
    }
}

impl From<anyhow::Error> for ParallelGetError {
    fn from(error: anyhow::Error) -> Self {
        ParallelGetError::UnexpectedError(error.to_string())
    }
}

pub type ParallelGetResult<T> = std::result::Result<T, ParallelGetError>;
