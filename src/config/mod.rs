// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;
use config::{Config as ConfigLoader, FileFormat};
use tracing::{debug, info, warn};

pub use schema::{Config, PoolConfig, ScriptsConfig, TargetsConfig};

use crate::engine::{FailurePolicy, MAX_WORKERS};
use crate::error::{ParallelGetError, ParallelGetResult};

const ENV_PREFIX: &str = "PARALLEL_GET";

/// Centralized configuration handling
impl Config {
    /// Load configuration from built-in defaults, a user file and the environment
    pub fn load(config_path: Option<&Path>) -> ParallelGetResult<Self> {
        debug!("Loading configuration");

        let mut config_builder = ConfigLoader::builder();

        // Default configuration
        config_builder = config_builder.add_source(
            config::File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml
            )
        );

        // User-provided configuration
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ParallelGetError::FileError {
                    path: path.to_path_buf(),
                    message: "Configuration file not found".to_string(),
                });
            }
            config_builder = config_builder.add_source(config::File::from(path));
            info!("Loading user configuration from: {}", path.display());
        } else if let Some(default_path) = Self::get_default_config_path() {
            if default_path.exists() {
                config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default configuration from: {}", default_path.display());
            }
        }

        // Environment variables, e.g. PARALLEL_GET__POOL__MAX_CONCURRENCY=4
        config_builder = config_builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
        );

        let config: Config = config_builder
            .build()
            .map_err(|e| ParallelGetError::ConfigError(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ParallelGetError::ConfigError(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration path
    pub fn get_default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parallel-get").join("config.toml"))
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> ParallelGetResult<()> {
        if self.targets.prefixes.iter().any(|p| p.is_empty()) {
            return Err(ParallelGetError::ConfigError("Target prefixes must not be empty".to_string()));
        }
        if self.scripts.interpreter.trim().is_empty() {
            return Err(ParallelGetError::ConfigError("Script interpreter must be set".to_string()));
        }
        if self.scripts.dry_run_var.is_empty() || self.scripts.dry_run_var.contains('=') {
            return Err(ParallelGetError::ConfigError(
                format!("Invalid dry-run variable name: {:?}", self.scripts.dry_run_var)
            ));
        }
        Ok(())
    }

    /// Concurrency ceiling for the worker pool, clamped to 1..=16
    pub fn pool_ceiling(&self) -> usize {
        let requested = self.pool.max_concurrency;
        if requested > MAX_WORKERS {
            warn!("max_concurrency {} exceeds the limit, using {}", requested, MAX_WORKERS);
        }
        requested.clamp(1, MAX_WORKERS)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.pool.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::KeepGoing
        }
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.pool.kill_grace_ms)
    }

    /// Definitions file resolved against the installation root
    pub fn definitions_path(&self) -> PathBuf {
        if self.targets.definitions.is_absolute() {
            self.targets.definitions.clone()
        } else {
            self.scripts.root.join(&self.targets.definitions)
        }
    }
}
