//! The immutable per-run configuration value.

use super::defaults::*;
use super::ConfigError;
use crate::codec::CodecKind;
use crate::dispatch::FailurePolicy;
use crate::exchange::{ExchangeKind, ProcessCommand};
use std::path::{Path, PathBuf};

/// Everything the engine needs to know about one run.
///
/// Built once (defaults, INI file, environment, CLI flags) and then only
/// read. Setters consume and return `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    tile_size: u32,
    workers: usize,
    module_path: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
    exchange: ExchangeKind,
    codec: CodecKind,
    failure_policy: FailurePolicy,
    entry_point: String,
    max_input_len: u32,
    process: ProcessCommand,
    staging_dir: PathBuf,
    keep_staged_files: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new().with_shared_dir(DEFAULT_SHARED_DIR)
    }
}

impl PipelineConfig {
    fn new() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            workers: DEFAULT_WORKERS,
            module_path: PathBuf::new(),
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            exchange: ExchangeKind::default(),
            codec: CodecKind::default(),
            failure_policy: FailurePolicy::default(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            max_input_len: DEFAULT_MAX_GUEST_INPUT_LEN,
            process: ProcessCommand::default(),
            staging_dir: std::env::temp_dir().join(DEFAULT_STAGING_SUBDIR),
            keep_staged_files: false,
        }
    }

    /// Point module, input and output at the standard layout under `dir`:
    /// `dir/filter.wasm`, `dir/input`, `dir/output`.
    pub fn with_shared_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.module_path = dir.join(DEFAULT_MODULE_FILE);
        self.input_dir = dir.join(DEFAULT_INPUT_SUBDIR);
        self.output_dir = dir.join(DEFAULT_OUTPUT_SUBDIR);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_path = path.into();
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_exchange(mut self, exchange: ExchangeKind) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Name of the guest export implementing the filter.
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    /// Largest encoded tile accepted by the zero-copy exchange.
    pub fn with_max_input_len(mut self, len: u32) -> Self {
        self.max_input_len = len;
        self
    }

    /// Runtime command for the streamed-pipe and staged-disk exchanges.
    pub fn with_process(mut self, process: ProcessCommand) -> Self {
        self.process = process;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Leave staged tile files on disk after the run, for debugging.
    pub fn with_keep_staged_files(mut self, keep: bool) -> Self {
        self.keep_staged_files = keep;
        self
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn exchange(&self) -> ExchangeKind {
        self.exchange
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn max_input_len(&self) -> u32 {
        self.max_input_len
    }

    pub fn process(&self) -> &ProcessCommand {
        &self.process
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn keep_staged_files(&self) -> bool {
        self.keep_staged_files
    }

    /// Reject values no run could start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::invalid(
                "tile_size",
                self.tile_size,
                "must be a positive integer",
            ));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::invalid(
                "workers",
                self.workers,
                format!("must be between 1 and {}", MAX_WORKERS),
            ));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::invalid(
                "entry_point",
                &self.entry_point,
                "must name a guest export",
            ));
        }
        if self.max_input_len == 0 {
            return Err(ConfigError::invalid(
                "max_input_len",
                self.max_input_len,
                "must be positive",
            ));
        }
        if self.exchange.uses_process() && self.process.program().trim().is_empty() {
            return Err(ConfigError::invalid(
                "process.program",
                self.process.program(),
                "a runtime program is required for process-based exchanges",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_shared_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.tile_size(), 256);
        assert_eq!(config.workers(), 8);
        assert_eq!(config.module_path(), Path::new("shared/filter.wasm"));
        assert_eq!(config.input_dir(), Path::new("shared/input"));
        assert_eq!(config.output_dir(), Path::new("shared/output"));
        assert_eq!(config.exchange(), ExchangeKind::ZeroCopy);
        assert_eq!(config.failure_policy(), FailurePolicy::FailFast);
        assert_eq!(config.entry_point(), "grayscale");
        assert!(!config.keep_staged_files());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_dir_moves_all_three_paths() {
        let config = PipelineConfig::default().with_shared_dir("/data/run1");
        assert_eq!(config.module_path(), Path::new("/data/run1/filter.wasm"));
        assert_eq!(config.input_dir(), Path::new("/data/run1/input"));
        assert_eq!(config.output_dir(), Path::new("/data/run1/output"));
    }

    #[test]
    fn test_builder_leaves_other_fields_alone() {
        let config = PipelineConfig::default().with_tile_size(64);
        assert_eq!(config.tile_size(), 64);
        assert_eq!(config.workers(), DEFAULT_WORKERS);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let err = PipelineConfig::default().with_tile_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("tile_size"));
    }

    #[test]
    fn test_worker_bounds() {
        assert!(PipelineConfig::default().with_workers(0).validate().is_err());
        assert!(PipelineConfig::default()
            .with_workers(MAX_WORKERS + 1)
            .validate()
            .is_err());
        assert!(PipelineConfig::default().with_workers(1).validate().is_ok());
    }

    #[test]
    fn test_blank_entry_point_rejected() {
        assert!(PipelineConfig::default()
            .with_entry_point("  ")
            .validate()
            .is_err());
    }

    #[test]
    fn test_process_exchange_needs_program() {
        let config = PipelineConfig::default()
            .with_exchange(ExchangeKind::StagedDisk)
            .with_process(ProcessCommand::new("", Vec::<String>::new()));
        assert!(config.validate().is_err());

        // The zero-copy exchange never launches a process.
        let config = config.with_exchange(ExchangeKind::ZeroCopy);
        assert!(config.validate().is_ok());
    }
}
