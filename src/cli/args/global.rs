//! Global CLI options shared across all commands

use std::path::PathBuf;

use crate::cache::SqliteCacheStore;
use crate::cli::{Cli, OutputFormat};
use crate::config::WorkerConfig;
use crate::error::Result;

/// Global CLI options passed to all command handlers.
///
/// Precedence is CLI flag > environment variable > config file > default.
/// This struct captures the CLI/env layer; config values are resolved by
/// [`GlobalOptions::load_config`].
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format (pretty, table, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ./pulsemind-sw.yaml)
    pub config: Option<String>,

    /// Custom cache database directory
    pub cache_dir: Option<String>,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            cache_dir: cli.cache_dir.clone(),
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Resolved config file path
    pub fn config_path(&self) -> PathBuf {
        WorkerConfig::resolve_path(self.config_ref())
    }

    /// Load the worker configuration, falling back to defaults when absent
    pub fn load_config(&self) -> Result<WorkerConfig> {
        WorkerConfig::load_at(self.config_ref())
    }

    /// Directory holding the cache database
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(SqliteCacheStore::cache_dir()?),
        }
    }

    /// Open the SQLite cache store
    pub fn open_store(&self) -> Result<SqliteCacheStore> {
        Ok(SqliteCacheStore::open_at(&self.cache_dir()?)?)
    }
}
