//! Top-level error for pipeline runs.

use crate::config::ConfigError;
use crate::dispatch::TileFailure;
use crate::guest::GuestError;
use crate::tile::{StitchError, TileError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that can stop a run.
///
/// Configuration and module errors occur before any tile is processed.
/// `Tile` carries the failing tile's coordinates and stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tiling(#[from] TileError),

    #[error(transparent)]
    Stitch(#[from] StitchError),

    #[error(transparent)]
    Guest(#[from] GuestError),

    #[error(transparent)]
    Tile(#[from] TileFailure),

    #[error("run cancelled before every tile was processed")]
    Cancelled,

    #[error("failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
