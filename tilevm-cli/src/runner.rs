//! CLI runner for common setup.
//!
//! Loads the configuration, applies environment overrides and installs
//! logging so the command handlers only deal with their own work.

use crate::error::CliError;
use std::path::Path;
use std::sync::Arc;
use tilevm::config::{apply_process_env, ConfigFile, PipelineConfig};
use tilevm::log::{Logger, TracingLogger};
use tilevm::logging::{init_logging, LoggingGuard};
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load `config_path` (or the default file) and initialize logging.
    pub fn new(config_path: Option<&Path>, debug: bool, verbose: bool) -> Result<Self, CliError> {
        let mut config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        config.pipeline = apply_process_env(config.pipeline);

        let log_path = &config.log_file;
        let log_dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| tilevm::logging::default_log_file().to_string());

        let logging_guard = init_logging(log_dir, &log_file, verbose, debug)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Run configuration from file and environment, before any flags.
    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config.pipeline
    }

    /// Library logger that forwards to `tracing`.
    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::new(TracingLogger)
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilevm v{}", tilevm::VERSION);
        info!("tilevm CLI: {} command", command);
        info!("log file: {}", self.config.log_file.display());
    }
}
