//! Grid coordinates, pixel rectangles and owned tiles.

use super::TileError;
use image::RgbaImage;
use std::fmt;

/// Position of a tile in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub col: u32,
    pub row: u32,
}

impl TileCoord {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TileRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Geometry of one image cut into `tile_size` squares.
///
/// The last column and row are clipped to the image bounds, so they may be
/// narrower or shorter than `tile_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    /// Compute the grid for a `width × height` image.
    ///
    /// # Errors
    ///
    /// `InvalidTileSize` for a zero tile size, `EmptyImage` if either
    /// dimension is zero.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Result<Self, TileError> {
        if tile_size == 0 {
            return Err(TileError::InvalidTileSize(tile_size));
        }
        if width == 0 || height == 0 {
            return Err(TileError::EmptyImage { width, height });
        }
        Ok(Self {
            width,
            height,
            tile_size,
            cols: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of tiles (`cols × rows`).
    pub fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.col < self.cols && coord.row < self.rows
    }

    /// Pixel rectangle of `coord`, or `None` outside the grid.
    pub fn rect(&self, coord: TileCoord) -> Option<TileRect> {
        if !self.contains(coord) {
            return None;
        }
        let x0 = coord.col * self.tile_size;
        let y0 = coord.row * self.tile_size;
        Some(TileRect {
            x0,
            y0,
            x1: x0.saturating_add(self.tile_size).min(self.width),
            y1: y0.saturating_add(self.tile_size).min(self.height),
        })
    }

    /// Every coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| TileCoord::new(col, row)))
    }
}

/// One tile with its own copy of the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub coord: TileCoord,
    pub rect: TileRect,
    pub pixels: RgbaImage,
}

impl Tile {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}
