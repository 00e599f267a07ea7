//! Split, dispatch, stitch: the full run for one image or a directory.

use crate::codec::TileCodec;
use crate::config::PipelineConfig;
use crate::dispatch::{Dispatcher, FailurePolicy, Task, TileFailure};
use crate::exchange::{
    ExchangeKind, ProcessCommand, StagedDiskExchange, StreamedPipeExchange, TileExchange,
    ZeroCopyExchange,
};
use crate::guest::{GuestOptions, GuestRuntimePool};
use crate::log::Logger;
use crate::tile::{split, stitch, stitch_partial, TileCoord, TileGrid};
use crate::{log_debug, log_info, log_warn, PipelineError};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Suffix appended to the input file stem for results.
pub const OUTPUT_SUFFIX: &str = "_final";

/// Counters for one processed image.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    pub exchange: ExchangeKind,
    pub workers: usize,
    pub tiles: usize,
    pub processed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl PipelineStats {
    pub fn tiles_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// A stitched image plus anything that went wrong on the way.
///
/// `failed` is only ever non-empty under [`FailurePolicy::Continue`]; the
/// failed cells are left transparent in `image`.
#[derive(Debug)]
pub struct PipelineOutput {
    pub image: RgbaImage,
    pub failed: Vec<TileFailure>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_coords(&self) -> Vec<TileCoord> {
        self.failed.iter().map(|f| f.coord).collect()
    }
}

/// Result for one file of a directory run.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats: PipelineStats,
    pub failed: Vec<TileCoord>,
}

enum Backend {
    ZeroCopy(GuestRuntimePool),
    StreamedPipe {
        command: ProcessCommand,
        module_path: PathBuf,
    },
    StagedDisk {
        command: ProcessCommand,
        module_path: PathBuf,
        staging_dir: PathBuf,
        keep_files: bool,
    },
}

/// Long-lived exchange resources for one strategy.
///
/// This is the one place an [`ExchangeKind`] is turned into concrete
/// exchanges. For zero-copy it owns the guest pool, which outlives every
/// run; the per-run exchanges only borrow its slots.
pub struct ExchangeBackend {
    backend: Backend,
    workers: usize,
    codec: Arc<dyn TileCodec>,
    max_input_len: u32,
}

impl ExchangeBackend {
    /// Build the backend `config` selects. For zero-copy this loads the
    /// module and instantiates one slot per worker.
    pub fn from_config(
        config: &PipelineConfig,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let codec = config.codec().build();
        let backend = match config.exchange() {
            ExchangeKind::ZeroCopy => {
                let pool = GuestRuntimePool::new(GuestOptions::from_config(config), logger)?;
                return Ok(Self::zero_copy(pool, codec));
            }
            ExchangeKind::StreamedPipe => Backend::StreamedPipe {
                command: config.process().clone(),
                module_path: config.module_path().to_path_buf(),
            },
            ExchangeKind::StagedDisk => Backend::StagedDisk {
                command: config.process().clone(),
                module_path: config.module_path().to_path_buf(),
                staging_dir: config.staging_dir().to_path_buf(),
                keep_files: config.keep_staged_files(),
            },
        };
        Ok(Self {
            backend,
            workers: config.workers(),
            codec,
            max_input_len: config.max_input_len(),
        })
    }

    /// Zero-copy over an existing pool; one worker per slot.
    pub fn zero_copy(pool: GuestRuntimePool, codec: Arc<dyn TileCodec>) -> Self {
        Self {
            workers: pool.len(),
            max_input_len: pool.options().max_input_len,
            backend: Backend::ZeroCopy(pool),
            codec,
        }
    }

    pub fn streamed_pipe(
        command: ProcessCommand,
        module_path: impl Into<PathBuf>,
        workers: usize,
        codec: Arc<dyn TileCodec>,
    ) -> Self {
        Self {
            backend: Backend::StreamedPipe {
                command,
                module_path: module_path.into(),
            },
            workers,
            codec,
            max_input_len: u32::MAX,
        }
    }

    pub fn staged_disk(
        command: ProcessCommand,
        module_path: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        keep_files: bool,
        workers: usize,
        codec: Arc<dyn TileCodec>,
    ) -> Self {
        Self {
            backend: Backend::StagedDisk {
                command,
                module_path: module_path.into(),
                staging_dir: staging_dir.into(),
                keep_files,
            },
            workers,
            codec,
            max_input_len: u32::MAX,
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        match self.backend {
            Backend::ZeroCopy(_) => ExchangeKind::ZeroCopy,
            Backend::StreamedPipe { .. } => ExchangeKind::StreamedPipe,
            Backend::StagedDisk { .. } => ExchangeKind::StagedDisk,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The guest pool, for zero-copy backends.
    pub fn pool(&self) -> Option<&GuestRuntimePool> {
        match &self.backend {
            Backend::ZeroCopy(pool) => Some(pool),
            _ => None,
        }
    }

    /// One exchange per worker for a single run.
    pub fn exchanges(&mut self) -> Result<Vec<Box<dyn TileExchange + '_>>, PipelineError> {
        let codec = &self.codec;
        let workers = self.workers;
        let max_input_len = self.max_input_len;

        let exchanges: Vec<Box<dyn TileExchange + '_>> = match &mut self.backend {
            Backend::ZeroCopy(pool) => pool
                .slots_mut()
                .iter_mut()
                .map(|slot| {
                    Box::new(ZeroCopyExchange::new(slot, codec.clone(), max_input_len))
                        as Box<dyn TileExchange + '_>
                })
                .collect(),
            Backend::StreamedPipe {
                command,
                module_path,
            } => (0..workers)
                .map(|_| {
                    Box::new(StreamedPipeExchange::new(
                        command.clone(),
                        module_path.clone(),
                        codec.clone(),
                    )) as Box<dyn TileExchange + '_>
                })
                .collect(),
            Backend::StagedDisk {
                command,
                module_path,
                staging_dir,
                keep_files,
            } => {
                let mut exchanges: Vec<Box<dyn TileExchange + '_>> = Vec::with_capacity(workers);
                for _ in 0..workers {
                    let exchange = StagedDiskExchange::new(
                        command.clone(),
                        module_path.clone(),
                        codec.clone(),
                        staging_dir.clone(),
                        *keep_files,
                    )
                    .map_err(|e| {
                        PipelineError::io("create staging directory", staging_dir.clone(), e)
                    })?;
                    exchanges.push(Box::new(exchange));
                }
                exchanges
            }
        };
        Ok(exchanges)
    }
}

/// Runs images through a backend with one configuration.
pub struct TilePipeline {
    config: PipelineConfig,
    dispatcher: Dispatcher,
    logger: Arc<dyn Logger>,
}

impl TilePipeline {
    pub fn new(config: PipelineConfig, logger: Arc<dyn Logger>) -> Result<Self, PipelineError> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.failure_policy(), Arc::clone(&logger));
        Ok(Self {
            config,
            dispatcher,
            logger,
        })
    }

    /// Cancel runs through `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.dispatcher = Dispatcher::new(self.config.failure_policy(), Arc::clone(&self.logger))
            .with_cancellation(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split `image`, run every tile through `backend`, stitch the results.
    ///
    /// Under fail-fast the first tile failure is returned as
    /// [`PipelineError::Tile`]. Under continue, failed cells are reported in
    /// [`PipelineOutput::failed`].
    pub fn process_image(
        &self,
        image: &RgbaImage,
        backend: &mut ExchangeBackend,
    ) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let tile_size = self.config.tile_size();
        let grid = TileGrid::new(image.width(), image.height(), tile_size)?;
        let tasks = Task::from_tiles(split(image, tile_size)?);

        log_debug!(
            self.logger,
            "{}x{} image -> {}x{} grid of {}px tiles via {}",
            image.width(),
            image.height(),
            grid.cols(),
            grid.rows(),
            tile_size,
            backend.kind()
        );

        let kind = backend.kind();
        let report = self.dispatcher.run(tasks, backend.exchanges()?);
        let mut stats = PipelineStats {
            exchange: kind,
            workers: report.workers(),
            tiles: report.len(),
            processed: report.processed_count(),
            failed: report.failed_count(),
            cancelled: report.cancelled_count(),
            elapsed: Duration::ZERO,
        };
        let (processed, failures) = report.into_parts();

        let (stitched, failed) = match self.dispatcher.policy() {
            FailurePolicy::FailFast => {
                if let Some(first) = failures.into_iter().next() {
                    return Err(PipelineError::Tile(first));
                }
                if stats.cancelled > 0 {
                    return Err(PipelineError::Cancelled);
                }
                (stitch(&grid, processed)?, Vec::new())
            }
            FailurePolicy::Continue => {
                if stats.cancelled > 0 {
                    return Err(PipelineError::Cancelled);
                }
                let partial = stitch_partial(&grid, processed)?;
                if !partial.is_complete() {
                    log_warn!(
                        self.logger,
                        "{} of {} tiles failed; output is partial",
                        partial.missing.len(),
                        grid.len()
                    );
                }
                (partial.image, failures)
            }
        };

        stats.elapsed = started.elapsed();
        log_info!(
            self.logger,
            "processed {} tiles with {} ({} workers) in {:?}",
            stats.tiles,
            stats.exchange,
            stats.workers,
            stats.elapsed
        );

        Ok(PipelineOutput {
            image: stitched,
            failed,
            stats,
        })
    }

    /// Read `input`, process it, write the result as PNG to `output`.
    pub fn process_file(
        &self,
        input: &Path,
        output: &Path,
        backend: &mut ExchangeBackend,
    ) -> Result<PipelineOutput, PipelineError> {
        let image = image::open(input)
            .map_err(|source| PipelineError::ImageRead {
                path: input.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let result = self.process_image(&image, backend)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io("create output directory", parent, e))?;
        }
        result
            .image
            .save(output)
            .map_err(|source| PipelineError::ImageWrite {
                path: output.to_path_buf(),
                source,
            })?;
        Ok(result)
    }

    /// Process every `.png` in the input directory into the output
    /// directory as `<stem>_final.png`. The output directory is emptied
    /// first.
    pub fn process_directory(
        &self,
        backend: &mut ExchangeBackend,
    ) -> Result<Vec<FileReport>, PipelineError> {
        let input_dir = self.config.input_dir();
        let output_dir = self.config.output_dir();

        let inputs = list_png_files(input_dir)?;
        reset_directory(output_dir)?;
        log_info!(
            self.logger,
            "processing {} images from {} into {}",
            inputs.len(),
            input_dir.display(),
            output_dir.display()
        );

        let mut reports = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output = output_dir.join(output_file_name(&input));
            let result = self.process_file(&input, &output, backend)?;
            reports.push(FileReport {
                failed: result.failed_coords(),
                stats: result.stats,
                input,
                output,
            });
        }
        Ok(reports)
    }
}

/// `<stem>_final.png`.
pub fn output_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}.png", stem, OUTPUT_SUFFIX)
}

fn list_png_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io("read input directory", dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| PipelineError::io("read input directory", dir, e))?
            .path();
        let is_png = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn reset_directory(dir: &Path) -> Result<(), PipelineError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| PipelineError::io("clear output directory", dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| PipelineError::io("create output directory", dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;
    use crate::log::NoOpLogger;
    use image::Rgba;

    const IDENTITY: &str = include_str!("../tests/fixtures/identity.wat");
    const ALWAYS_FAILS: &str = include_str!("../tests/fixtures/always_fails.wat");

    fn sample(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 200, 255]))
    }

    fn backend(wat: &str, workers: usize) -> ExchangeBackend {
        let pool = GuestRuntimePool::from_bytes(
            wat.as_bytes(),
            GuestOptions::new("unused.wasm", workers),
            Arc::new(NoOpLogger),
        )
        .unwrap();
        ExchangeBackend::zero_copy(pool, Arc::new(RawCodec))
    }

    fn pipeline(config: PipelineConfig) -> TilePipeline {
        TilePipeline::new(config, Arc::new(NoOpLogger)).unwrap()
    }

    #[test]
    fn test_identity_guest_reproduces_image() {
        let image = sample(100, 60);
        let mut backend = backend(IDENTITY, 3);
        let pipeline = pipeline(PipelineConfig::default().with_tile_size(32));

        let output = pipeline.process_image(&image, &mut backend).unwrap();

        assert_eq!(output.image, image);
        assert!(output.is_complete());
        assert_eq!(output.stats.tiles, 8);
        assert_eq!(output.stats.workers, 3);
        assert_eq!(output.stats.exchange, ExchangeKind::ZeroCopy);
    }

    #[test]
    fn test_fail_fast_returns_tile_failure() {
        let mut backend = backend(ALWAYS_FAILS, 2);
        let pipeline = pipeline(PipelineConfig::default().with_tile_size(16));

        let err = pipeline.process_image(&sample(32, 32), &mut backend).unwrap_err();

        match err {
            PipelineError::Tile(failure) => {
                assert_eq!(failure.stage.as_str(), "invoke");
                assert!(failure.to_string().starts_with("tile ("));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_continue_returns_partial_image() {
        let mut backend = backend(ALWAYS_FAILS, 2);
        let pipeline = pipeline(
            PipelineConfig::default()
                .with_tile_size(16)
                .with_failure_policy(FailurePolicy::Continue),
        );

        let output = pipeline.process_image(&sample(32, 16), &mut backend).unwrap();

        assert_eq!(output.failed.len(), 2);
        assert_eq!(output.stats.processed, 0);
        assert_eq!(output.image.dimensions(), (32, 16));
    }

    #[test]
    fn test_backend_reused_across_images() {
        let mut backend = backend(IDENTITY, 2);
        let pipeline = pipeline(PipelineConfig::default().with_tile_size(8));
        for size in [(9, 9), (16, 8), (1, 1)] {
            let image = sample(size.0, size.1);
            assert_eq!(pipeline.process_image(&image, &mut backend).unwrap().image, image);
        }
        let pool = backend.pool().unwrap();
        assert!(pool.slots().iter().all(|s| s.outstanding_allocations() == 0));
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut backend = backend(IDENTITY, 1);
        let pipeline = pipeline(PipelineConfig::default());
        let err = pipeline
            .process_image(&RgbaImage::new(0, 5), &mut backend)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Tiling(_)));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let result = TilePipeline::new(
            PipelineConfig::default().with_workers(0),
            Arc::new(NoOpLogger),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(Path::new("in/photo.PNG")), "photo_final.png");
    }

    #[test]
    fn test_directory_run_writes_final_pngs() {
        let temp = tempfile::TempDir::new().unwrap();
        let shared = temp.path();
        fs::create_dir_all(shared.join("input")).unwrap();
        fs::create_dir_all(shared.join("output")).unwrap();
        fs::write(shared.join("output").join("stale.png"), b"old").unwrap();
        fs::write(shared.join("input").join("notes.txt"), b"skip me").unwrap();
        let a = sample(40, 30);
        let b = sample(17, 5);
        a.save(shared.join("input").join("a.png")).unwrap();
        b.save(shared.join("input").join("b.png")).unwrap();

        let config = PipelineConfig::default()
            .with_shared_dir(shared)
            .with_tile_size(16);
        let mut backend = backend(IDENTITY, 2);
        let reports = pipeline(config).process_directory(&mut backend).unwrap();

        assert_eq!(reports.len(), 2);
        let out_a = image::open(shared.join("output").join("a_final.png")).unwrap().to_rgba8();
        assert_eq!(out_a, a);
        assert!(shared.join("output").join("b_final.png").exists());
        assert!(!shared.join("output").join("stale.png").exists());
    }
}
