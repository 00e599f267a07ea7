//! Pipeline flags shared by `run` and `bench`.
//!
//! Every flag is optional; an unset flag keeps the value from the config
//! file and environment.

use clap::Args;
use std::path::PathBuf;
use tilevm::codec::CodecKind;
use tilevm::config::PipelineConfig;
use tilevm::dispatch::FailurePolicy;
use tilevm::exchange::ExchangeKind;
use tilevm::pipeline::PipelineStats;

#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Exchange strategy: zero-copy, streamed-pipe or staged-disk
    #[arg(long)]
    pub exchange: Option<ExchangeKind>,

    /// Failure policy: fail-fast or continue
    #[arg(long)]
    pub policy: Option<FailurePolicy>,

    /// Tile edge length in pixels
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Number of concurrent workers (guest slots)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory holding filter.wasm, input/ and output/
    #[arg(long)]
    pub shared_dir: Option<PathBuf>,

    /// Guest module path
    #[arg(long)]
    pub module: Option<PathBuf>,

    /// Guest export implementing the filter
    #[arg(long)]
    pub entry_point: Option<String>,

    /// Tile encoding: png or raw
    #[arg(long)]
    pub codec: Option<CodecKind>,

    /// Input directory
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output directory (cleared before each run)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Leave staged tile files in the staging directory
    #[arg(long)]
    pub keep_staged: bool,
}

impl PipelineArgs {
    /// Layer the flags over `config`. `--shared-dir` is applied first so
    /// the explicit path flags win over it.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(dir) = &self.shared_dir {
            config = config.with_shared_dir(dir);
        }
        if let Some(exchange) = self.exchange {
            config = config.with_exchange(exchange);
        }
        if let Some(policy) = self.policy {
            config = config.with_failure_policy(policy);
        }
        if let Some(tile_size) = self.tile_size {
            config = config.with_tile_size(tile_size);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(module) = &self.module {
            config = config.with_module_path(module);
        }
        if let Some(entry_point) = &self.entry_point {
            config = config.with_entry_point(entry_point.as_str());
        }
        if let Some(codec) = self.codec {
            config = config.with_codec(codec);
        }
        if let Some(input) = &self.input {
            config = config.with_input_dir(input);
        }
        if let Some(output) = &self.output {
            config = config.with_output_dir(output);
        }
        if self.keep_staged {
            config = config.with_keep_staged_files(true);
        }
        config
    }
}

/// One-line summary of a processed image.
pub fn format_stats(stats: &PipelineStats) -> String {
    format!(
        "{} tiles via {} ({} workers) in {:.3}s, {:.1} tiles/s",
        stats.tiles,
        stats.exchange,
        stats.workers,
        stats.elapsed.as_secs_f64(),
        stats.tiles_per_second()
    )
}
