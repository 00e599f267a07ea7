//! How tile bytes reach a guest and come back.
//!
//! Every strategy implements [`TileExchange`]: take one tile, return its
//! processed pixels. The dispatcher only ever sees the trait, so strategies
//! are interchangeable without touching scheduling or stitching.
//!
//! | Strategy                | Transport                                      |
//! |-------------------------|------------------------------------------------|
//! | [`ZeroCopyExchange`]    | direct writes into an in-process guest's memory |
//! | [`StreamedPipeExchange`]| child process stdin/stdout                     |
//! | [`StagedDiskExchange`]  | one input and one output file per tile         |
//! | [`RemoteExchange`]      | object store plus one remote job per tile      |

mod disk;
mod error;
mod pipe;
mod process;
pub mod remote;
mod zero_copy;

pub use disk::StagedDiskExchange;
pub use error::{ExchangeError, InvocationStage};
pub use pipe::StreamedPipeExchange;
pub use process::ProcessCommand;
pub use remote::RemoteExchange;
pub use zero_copy::ZeroCopyExchange;

use crate::tile::Tile;
use image::RgbaImage;

/// Moves one tile through a guest.
///
/// An exchange is owned by a single worker; `&mut self` guarantees it never
/// runs two invocations at once.
pub trait TileExchange: Send {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError>;

    /// `false` once the exchange should receive no more tiles.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Short strategy name for logs and reports.
    fn name(&self) -> &'static str;
}

impl<T: TileExchange + ?Sized> TileExchange for Box<T> {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError> {
        (**self).invoke(tile)
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Strategy selection by name, as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExchangeKind {
    #[default]
    ZeroCopy,
    StreamedPipe,
    StagedDisk,
}

impl ExchangeKind {
    pub const ALL: [ExchangeKind; 3] = [
        ExchangeKind::StagedDisk,
        ExchangeKind::StreamedPipe,
        ExchangeKind::ZeroCopy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeKind::ZeroCopy => "zero-copy",
            ExchangeKind::StreamedPipe => "streamed-pipe",
            ExchangeKind::StagedDisk => "staged-disk",
        }
    }

    /// Whether the strategy launches an external runtime process.
    pub fn uses_process(self) -> bool {
        !matches!(self, ExchangeKind::ZeroCopy)
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExchangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero-copy" | "zerocopy" | "memory" => Ok(ExchangeKind::ZeroCopy),
            "streamed-pipe" | "pipe" | "stream" => Ok(ExchangeKind::StreamedPipe),
            "staged-disk" | "disk" | "file" => Ok(ExchangeKind::StagedDisk),
            other => Err(format!(
                "unknown exchange '{}' (expected zero-copy, streamed-pipe or staged-disk)",
                other
            )),
        }
    }
}

/// Reject a guest result that does not fit the tile it came from.
pub(crate) fn ensure_tile_dimensions(
    tile: &Tile,
    image: RgbaImage,
) -> Result<RgbaImage, ExchangeError> {
    if image.dimensions() != tile.pixels.dimensions() {
        return Err(ExchangeError::DimensionMismatch {
            expected_width: tile.width(),
            expected_height: tile.height(),
            actual_width: image.width(),
            actual_height: image.height(),
        });
    }
    Ok(image)
}
