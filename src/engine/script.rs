// src/engine/script.rs
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::{ParallelGetError, ParallelGetResult};

const SHEBANG: &str = "#!/bin/bash";

/// Builds self-contained task scripts from a shared preamble and one instruction
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    root: PathBuf,
    library: PathBuf,
}

/// A generated script on disk, owned by the job that created it
#[derive(Debug)]
pub struct TaskScript {
    path: PathBuf,
}

impl TaskScript {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScriptBuilder {
    pub fn new(root: impl Into<PathBuf>, library: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            library: library.into(),
        }
    }

    /// Shebang, change into the installation root, source the shared library.
    ///
    /// The library path is made absolute so `.` never searches PATH.
    pub fn preamble(&self) -> String {
        format!(
            "{}\ncd {}\n. {}\n",
            SHEBANG,
            shell_quote(&self.root.to_string_lossy()),
            shell_quote(&self.root.join(&self.library).to_string_lossy()),
        )
    }

    /// Write a uniquely named script for `instruction` into `scratch`
    pub fn build(&self, scratch: &Path, instruction: &str) -> ParallelGetResult<TaskScript> {
        let script_error = |message: String| ParallelGetError::ScriptError {
            path: scratch.to_path_buf(),
            message,
        };

        // O_EXCL create with a random name, safe under concurrent writers
        let mut file = tempfile::Builder::new()
            .prefix("job-")
            .suffix(".sh")
            .rand_bytes(10)
            .tempfile_in(scratch)
            .map_err(|e| script_error(format!("Failed to create script: {}", e)))?;

        file.write_all(self.preamble().as_bytes())
            .and_then(|_| file.write_all(instruction.as_bytes()))
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush())
            .map_err(|e| script_error(format!("Failed to write script: {}", e)))?;

        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o700))
            .map_err(|e| script_error(format!("Failed to mark script executable: {}", e)))?;

        // Removal is left to the scratch directory
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| script_error(format!("Failed to keep script: {}", e)))?;

        trace!("Generated script {}", path.display());
        Ok(TaskScript { path })
    }
}

/// Single-quote a word for the shell
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
