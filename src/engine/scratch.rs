// src/engine/scratch.rs
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{ParallelGetError, ParallelGetResult};

/// Scratch directory for one run's generated scripts.
///
/// Removed by `close`, or on drop for every other exit path.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh scratch directory under `parent`, or the system temp dir
    pub fn create(parent: Option<&Path>) -> ParallelGetResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("parallel-get.");

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| ParallelGetError::FileError {
            path: parent.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            message: format!("Failed to create scratch directory: {}", e),
        })?;

        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it
    pub fn close(self) -> ParallelGetResult<()> {
        let path: PathBuf = self.dir.path().to_path_buf();
        debug!("Removing scratch directory {}", path.display());

        self.dir.close().map_err(|e| {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
            ParallelGetError::FileError {
                path,
                message: format!("Failed to remove scratch directory: {}", e),
            }
        })
    }
}
