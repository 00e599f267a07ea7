//! Side-by-side timing of the exchange strategies on one image.

use crate::config::PipelineConfig;
use crate::exchange::ExchangeKind;
use crate::log::Logger;
use crate::pipeline::{ExchangeBackend, TilePipeline};
use crate::{log_info, log_warn, PipelineError};
use image::RgbaImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timings for one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub exchange: ExchangeKind,
    /// Backend construction (module load and slot instantiation for
    /// zero-copy), measured once.
    pub setup: Duration,
    /// Split-dispatch-stitch time of each iteration.
    pub runs: Vec<Duration>,
    pub tiles: usize,
    pub workers: usize,
    /// Output identical to the first strategy's output.
    pub matches_baseline: bool,
}

impl BenchmarkReport {
    pub fn mean(&self) -> Duration {
        if self.runs.is_empty() {
            return Duration::ZERO;
        }
        self.runs.iter().sum::<Duration>() / self.runs.len() as u32
    }

    pub fn best(&self) -> Duration {
        self.runs.iter().min().copied().unwrap_or_default()
    }

    /// Tiles per second over the mean run.
    pub fn tiles_per_second(&self) -> f64 {
        let secs = self.mean().as_secs_f64();
        if secs > 0.0 {
            self.tiles as f64 / secs
        } else {
            0.0
        }
    }
}

/// Process `image` `iterations` times with each strategy in `kinds`.
///
/// The first strategy's output is the baseline the others are compared
/// against. Any tile failure aborts the benchmark.
pub fn run_benchmark(
    config: &PipelineConfig,
    image: &RgbaImage,
    kinds: &[ExchangeKind],
    iterations: usize,
    logger: Arc<dyn Logger>,
) -> Result<Vec<BenchmarkReport>, PipelineError> {
    let iterations = iterations.max(1);
    let mut baseline: Option<RgbaImage> = None;
    let mut reports = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let config = config.clone().with_exchange(kind);

        let started = Instant::now();
        let mut backend = ExchangeBackend::from_config(&config, Arc::clone(&logger))?;
        let setup = started.elapsed();
        let pipeline = TilePipeline::new(config, Arc::clone(&logger))?;

        let mut runs = Vec::with_capacity(iterations);
        let mut last = None;
        for _ in 0..iterations {
            let output = pipeline.process_image(image, &mut backend)?;
            runs.push(output.stats.elapsed);
            last = Some(output);
        }
        let Some(output) = last else {
            continue;
        };

        let matches_baseline = match &baseline {
            Some(expected) => *expected == output.image,
            None => {
                baseline = Some(output.image.clone());
                true
            }
        };
        if !matches_baseline {
            log_warn!(logger, "{} output differs from baseline", kind);
        }

        let report = BenchmarkReport {
            exchange: kind,
            setup,
            runs,
            tiles: output.stats.tiles,
            workers: output.stats.workers,
            matches_baseline,
        };
        log_info!(
            logger,
            "{}: setup {:?}, mean {:?}, best {:?}, {:.1} tiles/s",
            kind,
            report.setup,
            report.mean(),
            report.best(),
            report.tiles_per_second()
        );
        reports.push(report);
    }

    Ok(reports)
}
