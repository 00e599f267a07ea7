//! Errors raised while splitting or stitching.

use super::TileCoord;
use thiserror::Error;

/// Splitting failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Tile edge length must be positive.
    #[error("invalid configuration: tile size must be positive (got {0})")]
    InvalidTileSize(u32),

    /// The source image has no pixels.
    #[error("cannot tile an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
}

/// Reassembly failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StitchError {
    /// Fewer results than the grid has tiles.
    #[error("incomplete tile set: expected {expected} tiles, received {received} (missing {})", format_coords(.missing))]
    IncompleteTileSet {
        expected: usize,
        received: usize,
        missing: Vec<TileCoord>,
    },

    /// A result names a tile the grid does not have.
    #[error("tile {coord} lies outside the {cols}x{rows} grid")]
    CoordinateOutOfBounds {
        coord: TileCoord,
        cols: u32,
        rows: u32,
    },

    /// Two results claim the same grid cell.
    #[error("tile {0} was delivered more than once")]
    DuplicateTile(TileCoord),

    /// A processed tile does not fit its grid cell.
    #[error("tile {coord} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        coord: TileCoord,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

fn format_coords(coords: &[TileCoord]) -> String {
    const SHOWN: usize = 8;
    let mut listed: Vec<String> = coords.iter().take(SHOWN).map(|c| c.to_string()).collect();
    if coords.len() > SHOWN {
        listed.push(format!("… +{}", coords.len() - SHOWN));
    }
    listed.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tile_size_display() {
        let err = TileError::InvalidTileSize(0);
        assert!(err.to_string().contains("tile size must be positive"));
    }

    #[test]
    fn test_incomplete_lists_missing_coords() {
        let err = StitchError::IncompleteTileSet {
            expected: 4,
            received: 2,
            missing: vec![TileCoord::new(1, 0), TileCoord::new(1, 1)],
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("(1,0), (1,1)"));
    }

    #[test]
    fn test_missing_list_is_truncated() {
        let missing: Vec<_> = (0..20).map(|c| TileCoord::new(c, 0)).collect();
        let msg = format_coords(&missing);
        assert!(msg.ends_with("… +12"));
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = StitchError::CoordinateOutOfBounds {
            coord: TileCoord::new(5, 0),
            cols: 3,
            rows: 2,
        };
        assert_eq!(err.to_string(), "tile (5,0) lies outside the 3x2 grid");
    }
}
