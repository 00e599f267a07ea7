//! Outcome of one dispatcher run.

use super::{TileFailure, TileOutcome, TileResult};
use crate::tile::TileCoord;
use image::RgbaImage;
use std::time::Duration;

/// Every task's result, in task order.
#[derive(Debug)]
pub struct DispatchReport {
    results: Vec<TileResult>,
    workers: usize,
    elapsed: Duration,
    first_failure: Option<usize>,
}

impl DispatchReport {
    pub(crate) fn new(
        mut results: Vec<TileResult>,
        workers: usize,
        elapsed: Duration,
        first_failure: Option<usize>,
    ) -> Self {
        results.sort_by_key(|r| r.index);
        Self {
            results,
            workers,
            elapsed,
            first_failure,
        }
    }

    pub fn results(&self) -> &[TileResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn processed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_processed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_cancelled()).count()
    }

    /// True if every task produced an image.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(TileResult::is_processed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TileFailure> {
        self.results.iter().filter_map(TileResult::failure)
    }

    /// The failure that arrived first; under fail-fast, the one that
    /// cancelled the run.
    pub fn first_failure(&self) -> Option<&TileFailure> {
        let index = self.first_failure?;
        self.results
            .iter()
            .find(|r| r.index == index)
            .and_then(TileResult::failure)
    }

    /// Coordinates that did not produce an image (failed or cancelled).
    pub fn unprocessed_coords(&self) -> Vec<TileCoord> {
        self.results
            .iter()
            .filter(|r| !r.is_processed())
            .map(|r| r.coord)
            .collect()
    }

    /// Tiles processed by each worker, indexed by worker id.
    pub fn tiles_per_worker(&self) -> Vec<usize> {
        let mut counts = vec![0; self.workers];
        for result in self.results.iter().filter(|r| r.is_processed()) {
            if let Some(count) = result.worker.and_then(|w| counts.get_mut(w)) {
                *count += 1;
            }
        }
        counts
    }

    /// Split into processed images and failures. The first failure to
    /// arrive is moved to the front of the failure list.
    pub fn into_parts(self) -> (Vec<(TileCoord, RgbaImage)>, Vec<TileFailure>) {
        let mut processed = Vec::with_capacity(self.results.len());
        let mut failures = Vec::new();
        for result in self.results {
            match result.outcome {
                TileOutcome::Processed(image) => processed.push((result.coord, image)),
                TileOutcome::Failed(failure) => {
                    if Some(result.index) == self.first_failure {
                        failures.insert(0, failure);
                    } else {
                        failures.push(failure);
                    }
                }
                TileOutcome::Cancelled => {}
            }
        }
        (processed, failures)
    }
}
