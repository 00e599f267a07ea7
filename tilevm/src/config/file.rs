//! `~/.tilevm/config.ini` handling.
//!
//! ```ini
//! [pipeline]
//! tile_size = 256
//! workers = 8
//! exchange = zero-copy        ; zero-copy | streamed-pipe | staged-disk
//! codec = png                 ; png | raw
//! failure_policy = fail-fast  ; fail-fast | continue
//!
//! [guest]
//! module = shared/filter.wasm
//! entry_point = grayscale
//! max_input_len = 67108864
//!
//! [paths]
//! input = shared/input
//! output = shared/output
//! staging = /tmp/tilevm-staging
//! keep_staged_files = false
//!
//! [process]
//! program = wasmedge
//! args = {module} process_stdin
//!
//! [logging]
//! file = logs/tilevm.log
//! ```

use super::defaults::DEFAULT_LOG_FILE;
use super::{ConfigError, PipelineConfig};
use ini::Ini;
use std::path::{Path, PathBuf};

/// Contents of a config file: the run configuration plus CLI-only settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub pipeline: PipelineConfig,
    pub log_file: PathBuf,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        super::parser::parse_ini(&ini)
    }

    /// Parse INI text directly.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        super::parser::parse_ini(&ini)
    }

    /// The file as it would be written by [`save_to`](Self::save_to).
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(write_err)
    }

    /// Create the default file if it does not exist yet; returns its path.
    pub fn ensure_exists() -> Result<PathBuf, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

/// `~/.tilevm`, or `./.tilevm` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilevm")
}

pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
