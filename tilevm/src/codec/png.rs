//! PNG tile codec.

use super::{CodecError, TileCodec};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Lossless PNG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl TileCodec for PngCodec {
    fn encode(&self, pixels: &RgbaImage) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| CodecError::Encode {
                format: "png",
                width: pixels.width(),
                height: pixels.height(),
                reason: e.to_string(),
            })?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map(|img| img.to_rgba8())
            .map_err(|e| CodecError::Decode {
                format: "png",
                len: bytes.len(),
                reason: e.to_string(),
            })
    }

    fn extension(&self) -> &'static str {
        "png"
    }

    fn name(&self) -> &'static str {
        "png"
    }
}
