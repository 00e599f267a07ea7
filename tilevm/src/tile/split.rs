//! Cutting a source image into owned tiles.

use super::{Tile, TileError, TileGrid};
use image::{imageops, RgbaImage};

/// Split `image` into `tile_size` tiles in row-major order.
///
/// Every tile owns a copy of its pixels so it can move to a worker thread
/// independently of the source image.
pub fn split(image: &RgbaImage, tile_size: u32) -> Result<Vec<Tile>, TileError> {
    let grid = TileGrid::new(image.width(), image.height(), tile_size)?;
    let tiles = grid
        .coords()
        .filter_map(|coord| grid.rect(coord).map(|rect| (coord, rect)))
        .map(|(coord, rect)| Tile {
            coord,
            rect,
            pixels: imageops::crop_imm(image, rect.x0, rect.y0, rect.width(), rect.height())
                .to_image(),
        })
        .collect();
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileCoord;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8, 255])
        })
    }

    /// Every pixel is covered by exactly one tile.
    fn assert_exact_cover(width: u32, height: u32, tile_size: u32) {
        let image = gradient(width, height);
        let tiles = split(&image, tile_size).unwrap();

        let mut hits = vec![0u8; (width * height) as usize];
        for tile in &tiles {
            assert_eq!(tile.pixels.width(), tile.rect.width());
            assert_eq!(tile.pixels.height(), tile.rect.height());
            assert!(tile.rect.width() <= tile_size && tile.rect.height() <= tile_size);
            for y in tile.rect.y0..tile.rect.y1 {
                for x in tile.rect.x0..tile.rect.x1 {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(
            hits.iter().all(|&h| h == 1),
            "{}x{} @ {}: gap or overlap",
            width,
            height,
            tile_size
        );

        let area: u64 = tiles.iter().map(|t| t.rect.area()).sum();
        assert_eq!(area, width as u64 * height as u64);
    }

    #[test]
    fn test_exact_cover_for_many_shapes() {
        for (w, h) in [(1, 1), (7, 3), (64, 64), (65, 33), (100, 1), (1, 100)] {
            for t in [1, 2, 5, 16, 64, 300] {
                assert_exact_cover(w, h, t);
            }
        }
    }

    #[test]
    fn test_only_last_column_and_row_are_clipped() {
        let tiles = split(&gradient(70, 45), 32).unwrap();
        for tile in &tiles {
            if tile.coord.col < 2 {
                assert_eq!(tile.rect.width(), 32);
            } else {
                assert_eq!(tile.rect.width(), 6);
            }
            if tile.coord.row < 1 {
                assert_eq!(tile.rect.height(), 32);
            } else {
                assert_eq!(tile.rect.height(), 13);
            }
        }
    }

    #[test]
    fn test_768x512_at_256() {
        let tiles = split(&RgbaImage::new(768, 512), 256).unwrap();
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|t| t.width() == 256 && t.height() == 256));
    }

    #[test]
    fn test_768x512_at_300() {
        let tiles = split(&RgbaImage::new(768, 512), 300).unwrap();
        assert_eq!(tiles.len(), 6);
        let last = tiles.last().unwrap();
        assert_eq!(last.coord, TileCoord::new(2, 1));
        assert_eq!((last.width(), last.height()), (168, 212));
    }

    #[test]
    fn test_single_pixel_image() {
        let tiles = split(&gradient(1, 1), 256).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].width(), tiles[0].height()), (1, 1));
    }

    #[test]
    fn test_exactly_divisible_has_no_trailing_tile() {
        let tiles = split(&gradient(512, 256), 128).unwrap();
        assert_eq!(tiles.len(), 8);
        assert!(tiles.iter().all(|t| t.width() == 128 && t.height() == 128));
    }

    #[test]
    fn test_tile_pixels_match_source() {
        let image = gradient(50, 30);
        let tiles = split(&image, 16).unwrap();
        let tile = tiles.iter().find(|t| t.coord == TileCoord::new(1, 1)).unwrap();
        assert_eq!(tile.pixels.get_pixel(3, 4), image.get_pixel(16 + 3, 16 + 4));
    }

    #[test]
    fn test_zero_tile_size_is_invalid() {
        assert_eq!(
            split(&gradient(4, 4), 0).unwrap_err(),
            TileError::InvalidTileSize(0)
        );
    }
}
