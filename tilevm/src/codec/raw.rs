//! Uncompressed RGBA codec with a tiny dimension header.

use super::{CodecError, TileCodec};
use image::RgbaImage;

/// Bytes before the pixel data: `width: u32 LE`, `height: u32 LE`.
pub const RAW_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl TileCodec for RawCodec {
    fn encode(&self, pixels: &RgbaImage) -> Result<Vec<u8>, CodecError> {
        let body = pixels.as_raw();
        let mut buf = Vec::with_capacity(RAW_HEADER_LEN + body.len());
        buf.extend_from_slice(&pixels.width().to_le_bytes());
        buf.extend_from_slice(&pixels.height().to_le_bytes());
        buf.extend_from_slice(body);
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        let fail = |reason: String| CodecError::Decode {
            format: "raw",
            len: bytes.len(),
            reason,
        };

        if bytes.len() < RAW_HEADER_LEN {
            return Err(fail(format!("shorter than the {RAW_HEADER_LEN}-byte header")));
        }
        let (header, body) = bytes.split_at(RAW_HEADER_LEN);
        let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let expected = (width as u64) * (height as u64) * 4;
        if body.len() as u64 != expected {
            return Err(fail(format!(
                "{width}x{height} needs {expected} pixel bytes, found {}",
                body.len()
            )));
        }

        RgbaImage::from_raw(width, height, body.to_vec())
            .ok_or_else(|| fail("buffer does not match dimensions".to_string()))
    }

    fn extension(&self) -> &'static str {
        "raw"
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_header_layout() {
        let bytes = RawCodec
            .encode(&RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])))
            .unwrap();
        assert_eq!(&bytes[..8], &[3, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(bytes.len(), 8 + 3 * 2 * 4);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_extension_matches_name() {
        assert_eq!(RawCodec.extension(), "raw");
        assert_eq!(RawCodec.extension(), RawCodec.name());
    }

    #[test]
    fn test_truncated_header() {
        assert!(RawCodec.decode(&[1, 0, 0]).is_err());
    }

    #[test]
    fn test_body_length_mismatch() {
        let mut bytes = RawCodec.encode(&RgbaImage::new(2, 2)).unwrap();
        bytes.pop();
        let err = RawCodec.decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("needs 16 pixel bytes"));
    }
}
