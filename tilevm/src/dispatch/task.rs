//! Units of work and their results.

use super::TileFailure;
use crate::tile::{Tile, TileCoord};
use image::RgbaImage;
use std::time::Duration;

/// One tile to process. `index` identifies the task within a run.
#[derive(Debug, Clone)]
pub struct Task {
    pub index: usize,
    pub tile: Tile,
}

impl Task {
    pub fn new(index: usize, tile: Tile) -> Self {
        Self { index, tile }
    }

    /// Number tiles in the order given.
    pub fn from_tiles(tiles: Vec<Tile>) -> Vec<Task> {
        tiles
            .into_iter()
            .enumerate()
            .map(|(index, tile)| Task::new(index, tile))
            .collect()
    }

    pub fn coord(&self) -> TileCoord {
        self.tile.coord
    }
}

#[derive(Debug)]
pub enum TileOutcome {
    Processed(RgbaImage),
    Failed(TileFailure),
    /// Not attempted because the run was cancelled.
    Cancelled,
}

/// The single result reported for one task.
#[derive(Debug)]
pub struct TileResult {
    pub index: usize,
    pub coord: TileCoord,
    pub outcome: TileOutcome,
    /// Worker that produced the outcome; `None` if no worker touched it.
    pub worker: Option<usize>,
    pub elapsed: Duration,
}

impl TileResult {
    pub(crate) fn cancelled(index: usize, coord: TileCoord, worker: Option<usize>) -> Self {
        Self {
            index,
            coord,
            outcome: TileOutcome::Cancelled,
            worker,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn failed(index: usize, failure: TileFailure, worker: Option<usize>) -> Self {
        Self {
            index,
            coord: failure.coord,
            outcome: TileOutcome::Failed(failure),
            worker,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self.outcome, TileOutcome::Processed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TileOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, TileOutcome::Cancelled)
    }

    pub fn failure(&self) -> Option<&TileFailure> {
        match &self.outcome {
            TileOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}
