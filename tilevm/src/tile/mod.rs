//! Tile geometry: splitting an image into a grid and stitching it back.
//!
//! ```text
//!   RgbaImage ──split()──▶ Vec<Tile> ──(dispatcher)──▶ results ──stitch()──▶ RgbaImage
//!                 │                                                 │
//!                 └──────────────── TileGrid (shared geometry) ─────┘
//! ```
//!
//! Tiles are produced in row-major order, but the stitcher places results
//! purely by their [`TileCoord`], so completion order never matters.
//!
//! # Example
//!
//! ```
//! use image::RgbaImage;
//! use tilevm::tile::{split, TileGrid};
//!
//! let image = RgbaImage::new(768, 512);
//! let grid = TileGrid::new(768, 512, 300).unwrap();
//! assert_eq!((grid.cols(), grid.rows()), (3, 2));
//!
//! let tiles = split(&image, 300).unwrap();
//! assert_eq!(tiles.len(), 6);
//! assert_eq!(tiles[2].rect.width(), 168);
//! assert_eq!(tiles[5].rect.height(), 212);
//! ```

mod error;
mod split;
mod stitch;
mod types;

pub use error::{StitchError, TileError};
pub use split::split;
pub use stitch::{stitch, stitch_partial, PartialStitch};
pub use types::{Tile, TileCoord, TileGrid, TileRect};
