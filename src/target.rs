// src/target.rs
use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::{ParallelGetError, ParallelGetResult};

/// A top-level unit of work: one line of shell text from the definitions file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// 1-based line number in the definitions file
    pub line: usize,
    pub instruction: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.instruction)
    }
}

/// Selects target lines from a definitions file by prefix
#[derive(Debug, Clone)]
pub struct TargetSource {
    path: PathBuf,
    prefixes: Vec<String>,
}

impl TargetSource {
    pub fn new(path: impl Into<PathBuf>, prefixes: Vec<String>) -> Self {
        Self {
            path: path.into(),
            prefixes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the definitions file and return every recognized target, in file order
    pub fn load(&self) -> ParallelGetResult<Vec<Target>> {
        debug!("Reading targets from {}", self.path.display());

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ParallelGetError::FileError {
                path: self.path.clone(),
                message: format!("Failed to read definitions: {}", e),
            })?;

        let targets = self.parse(&content);
        info!("Found {} targets in {}", targets.len(), self.path.display());
        Ok(targets)
    }

    /// Pick the lines that start with one of the recognized prefixes
    pub fn parse(&self, content: &str) -> Vec<Target> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| self.prefixes.iter().any(|p| line.starts_with(p.as_str())))
            .map(|(idx, line)| Target {
                line: idx + 1,
                instruction: line.to_string(),
            })
            .collect()
    }
}
