//! Reassembling processed tiles onto a full-size canvas.

use super::{StitchError, TileCoord, TileGrid};
use image::{imageops, RgbaImage};
use std::collections::HashSet;

/// Result of a stitch that tolerated missing tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialStitch {
    /// Full-size image; missing cells are left transparent black.
    pub image: RgbaImage,
    /// Cells that had no result, in row-major order.
    pub missing: Vec<TileCoord>,
}

impl PartialStitch {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Paste every result at its tile origin.
///
/// Results may arrive in any order. Every grid cell must be filled exactly
/// once with a tile of the cell's exact dimensions.
pub fn stitch<I>(grid: &TileGrid, results: I) -> Result<RgbaImage, StitchError>
where
    I: IntoIterator<Item = (TileCoord, RgbaImage)>,
{
    let partial = stitch_partial(grid, results)?;
    if partial.is_complete() {
        return Ok(partial.image);
    }
    Err(StitchError::IncompleteTileSet {
        expected: grid.len(),
        received: grid.len() - partial.missing.len(),
        missing: partial.missing,
    })
}

/// Like [`stitch`], but missing cells are reported instead of failing.
///
/// Out-of-grid coordinates, duplicates and wrongly sized tiles are still
/// errors; they indicate a broken run rather than a failed tile.
pub fn stitch_partial<I>(grid: &TileGrid, results: I) -> Result<PartialStitch, StitchError>
where
    I: IntoIterator<Item = (TileCoord, RgbaImage)>,
{
    let mut canvas = RgbaImage::new(grid.width(), grid.height());
    let mut placed = HashSet::with_capacity(grid.len());

    for (coord, pixels) in results {
        let rect = grid
            .rect(coord)
            .ok_or(StitchError::CoordinateOutOfBounds {
                coord,
                cols: grid.cols(),
                rows: grid.rows(),
            })?;

        if pixels.width() != rect.width() || pixels.height() != rect.height() {
            return Err(StitchError::DimensionMismatch {
                coord,
                expected_width: rect.width(),
                expected_height: rect.height(),
                actual_width: pixels.width(),
                actual_height: pixels.height(),
            });
        }

        if !placed.insert(coord) {
            return Err(StitchError::DuplicateTile(coord));
        }

        imageops::replace(&mut canvas, &pixels, rect.x0 as i64, rect.y0 as i64);
    }

    let missing = grid.coords().filter(|c| !placed.contains(c)).collect();
    Ok(PartialStitch {
        image: canvas,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::split;
    use image::Rgba;

    fn sample(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, (x ^ y) as u8, 200]))
    }

    fn pieces(image: &RgbaImage, tile_size: u32) -> Vec<(TileCoord, RgbaImage)> {
        split(image, tile_size)
            .unwrap()
            .into_iter()
            .map(|t| (t.coord, t.pixels))
            .collect()
    }

    #[test]
    fn test_split_then_stitch_is_identity() {
        let image = sample(70, 45);
        let grid = TileGrid::new(70, 45, 16).unwrap();

        let stitched = stitch(&grid, pieces(&image, 16)).unwrap();

        assert_eq!(stitched, image);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let image = sample(64, 40);
        let grid = TileGrid::new(64, 40, 12).unwrap();

        let mut reversed = pieces(&image, 12);
        reversed.reverse();
        let mut interleaved = pieces(&image, 12);
        let len = interleaved.len();
        interleaved.rotate_left(len / 2);

        assert_eq!(stitch(&grid, reversed).unwrap(), image);
        assert_eq!(stitch(&grid, interleaved).unwrap(), image);
    }

    #[test]
    fn test_incomplete_set_reports_missing() {
        let image = sample(32, 32);
        let grid = TileGrid::new(32, 32, 16).unwrap();
        let mut parts = pieces(&image, 16);
        parts.retain(|(c, _)| *c != TileCoord::new(1, 0));

        match stitch(&grid, parts).unwrap_err() {
            StitchError::IncompleteTileSet {
                expected,
                received,
                missing,
            } => {
                assert_eq!(expected, 4);
                assert_eq!(received, 3);
                assert_eq!(missing, vec![TileCoord::new(1, 0)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_bounds_coordinate() {
        let grid = TileGrid::new(32, 32, 16).unwrap();
        let err = stitch(&grid, vec![(TileCoord::new(2, 0), RgbaImage::new(16, 16))]).unwrap_err();
        assert!(matches!(err, StitchError::CoordinateOutOfBounds { cols: 2, rows: 2, .. }));
    }

    #[test]
    fn test_duplicate_coordinate() {
        let grid = TileGrid::new(16, 16, 16).unwrap();
        let parts = vec![
            (TileCoord::new(0, 0), RgbaImage::new(16, 16)),
            (TileCoord::new(0, 0), RgbaImage::new(16, 16)),
        ];
        assert_eq!(
            stitch(&grid, parts).unwrap_err(),
            StitchError::DuplicateTile(TileCoord::new(0, 0))
        );
    }

    #[test]
    fn test_wrong_tile_dimensions() {
        let grid = TileGrid::new(20, 20, 16).unwrap();
        let err = stitch(&grid, vec![(TileCoord::new(1, 0), RgbaImage::new(16, 16))]).unwrap_err();
        assert!(matches!(
            err,
            StitchError::DimensionMismatch {
                expected_width: 4,
                expected_height: 16,
                ..
            }
        ));
    }

    #[test]
    fn test_partial_leaves_missing_transparent() {
        let image = sample(32, 16);
        let grid = TileGrid::new(32, 16, 16).unwrap();
        let mut parts = pieces(&image, 16);
        parts.retain(|(c, _)| c.col == 0);

        let partial = stitch_partial(&grid, parts).unwrap();

        assert_eq!(partial.missing, vec![TileCoord::new(1, 0)]);
        assert_eq!(partial.image.get_pixel(3, 3), image.get_pixel(3, 3));
        assert_eq!(*partial.image.get_pixel(20, 3), Rgba([0, 0, 0, 0]));
    }
}
