use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub targets: TargetsConfig,
    pub scripts: ScriptsConfig,
    pub pool: PoolConfig,
}

/// Where targets come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetsConfig {
    /// Definitions file, relative to the installation root unless absolute
    pub definitions: PathBuf,
    pub prefixes: Vec<String>,
}

/// How generated task scripts are built and run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptsConfig {
    /// Installation root every script changes into
    pub root: PathBuf,
    /// Shared shell library, relative to the root
    pub library: PathBuf,
    pub interpreter: String,
    pub dry_run_var: String,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    pub max_concurrency: usize,
    pub fail_fast: bool,
    pub kill_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: TargetsConfig {
                definitions: PathBuf::from("get"),
                prefixes: vec![
                    "get_current_ubuntu".to_string(),
                    "get_all_ubuntu".to_string(),
                ],
            },
            scripts: ScriptsConfig {
                root: PathBuf::from("."),
                library: PathBuf::from("common/libc.sh"),
                interpreter: "bash".to_string(),
                dry_run_var: "LIBC_DRY_RUN".to_string(),
            },
            pool: PoolConfig {
                max_concurrency: 16,
                fail_fast: true,
                kill_grace_ms: 2000,
            },
        }
    }
}
