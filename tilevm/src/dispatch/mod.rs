//! Bounded worker pool that runs tiles through exchanges.
//!
//! # Architecture
//!
//! ```text
//!   tasks ──► feeder ──► sync_channel (bounded) ──┬─► worker 0 ─ exchange 0 ─┐
//!                                                 ├─► worker 1 ─ exchange 1 ─┼─► results ──► collector
//!                                                 └─► worker N ─ exchange N ─┘
//! ```
//!
//! Worker `i` owns exchange `i` (and through it, guest slot `i`) for the
//! whole run, so no slot ever serves two tiles at once. The queue and the
//! result channel are the only shared state. The dispatcher reports exactly
//! one [`TileResult`] per [`Task`], in task order, whatever order the
//! workers finish in.

mod dispatcher;
mod report;
mod task;

pub use dispatcher::Dispatcher;
pub use report::DispatchReport;
pub use task::{Task, TileOutcome, TileResult};

use crate::exchange::{ExchangeError, InvocationStage};
use crate::tile::TileCoord;
use thiserror::Error;

/// What to do when a tile fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Cancel the run at the first failure; remaining tiles are reported
    /// as cancelled.
    #[default]
    FailFast,
    /// Record the failure and keep processing. The caller gets a partial
    /// result with the failed coordinates.
    Continue,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::Continue => "continue",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "abort" => Ok(FailurePolicy::FailFast),
            "continue" | "partial" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "unknown failure policy '{}' (expected fail-fast or continue)",
                other
            )),
        }
    }
}

/// Why a task produced no image.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Every worker retired (degraded slots) before this task ran.
    #[error("no healthy workers remain")]
    NoHealthyWorkers,

    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    /// The task was accepted but no worker ever reported on it.
    #[error("task was lost before a worker reported it")]
    WorkerLost,
}

/// A failed tile with the step it failed in.
#[derive(Debug, Error)]
#[error("tile {coord} failed during {stage}: {error}")]
pub struct TileFailure {
    pub coord: TileCoord,
    pub stage: InvocationStage,
    #[source]
    pub error: DispatchError,
}

impl TileFailure {
    pub fn new(coord: TileCoord, stage: InvocationStage, error: DispatchError) -> Self {
        Self {
            coord,
            stage,
            error,
        }
    }

    /// Failure from an exchange, tagged with the exchange's stage.
    pub fn from_exchange(coord: TileCoord, error: ExchangeError) -> Self {
        Self::new(coord, error.stage(), DispatchError::Exchange(error))
    }

    /// The exchange error behind this failure, if any.
    pub fn exchange_error(&self) -> Option<&ExchangeError> {
        match &self.error {
            DispatchError::Exchange(e) => Some(e),
            _ => None,
        }
    }
}
