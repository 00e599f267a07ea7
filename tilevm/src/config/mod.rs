//! Run configuration.
//!
//! [`PipelineConfig`] is the single immutable value handed to the splitter,
//! the guest pool and the dispatcher. It can be built in code, loaded from
//! an INI file through [`ConfigFile`], and adjusted by the environment
//! variables the benchmark scripts set (`TILE_SIZE`, `MAX_WORKERS`,
//! `SHARED_DIR`).
//!
//! ```
//! use tilevm::config::PipelineConfig;
//! use tilevm::exchange::ExchangeKind;
//!
//! let config = PipelineConfig::default()
//!     .with_tile_size(128)
//!     .with_workers(4)
//!     .with_exchange(ExchangeKind::StreamedPipe);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.tile_size(), 128);
//! ```

mod defaults;
mod env;
mod file;
mod parser;
mod pipeline;
mod writer;

pub use defaults::*;
pub use env::{apply_env_overrides, apply_process_env};
pub use file::{config_directory, config_file_path, ConfigFile};
pub use pipeline::PipelineConfig;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems, reported before any run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or unparseable.
    #[error("invalid configuration: {key} = '{value}' - {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
