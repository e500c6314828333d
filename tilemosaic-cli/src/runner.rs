//! CLI runner for common setup and operations.
//!
//! Encapsulates logging initialization, configuration loading and the async
//! runtime so command handlers only deal with their own arguments.

use std::future::Future;
use std::io::IsTerminal;

use serde_json::{Map, Value};
use tilemosaic::backend::BackendConfig;
use tilemosaic::builder::BuildOptions;
use tilemosaic::cache::MosaicCache;
use tilemosaic::config::{ConfigFile, DEFAULT_LOG_FILE_NAME};
use tilemosaic::logging::{init_logging, LoggingGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    runtime: Runtime,
}

impl CliRunner {
    /// Create a new CLI runner with optional debug logging.
    ///
    /// Stdout logging is only enabled when stdout is a terminal, so JSON
    /// output piped to another program stays clean.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ".".into());
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());

        let stdout_enabled = std::io::stdout().is_terminal();

        let logging_guard = init_logging(&log_dir, &log_file, stdout_enabled, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Config(format!("Failed to start async runtime: {}", e)))?;

        Ok(Self {
            logging_guard,
            config,
            runtime,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilemosaic v{}", tilemosaic::VERSION);
        info!("tilemosaic CLI: {} command", command);
    }

    /// Builder options seeded from the `[builder]` section.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions::default().with_filter(self.config.filter_options())
    }

    /// Backend configuration derived from the loaded settings.
    pub fn backend_config(&self, stac_query: Map<String, Value>) -> BackendConfig {
        BackendConfig {
            cache: MosaicCache::new(self.config.cache_config()),
            http_timeout: self.config.http_timeout(),
            aws: self.config.aws_settings(),
            search: self.config.search_options(),
            stac_query,
            build: self.build_options(),
        }
    }

    /// Drive a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
