//! Tile byte formats crossing the host/guest boundary.
//!
//! A [`TileCodec`] turns a tile's pixels into the bytes the guest expects
//! and turns the guest's answer back into pixels. The exchange strategies
//! are codec-agnostic; the pipeline picks one codec per run.
//!
//! - [`PngCodec`] - PNG, the format the reference guest reads and writes
//! - [`RawCodec`] - 8-byte little-endian `width, height` header followed by
//!   RGBA8 pixels; no compression, useful for measuring pure transfer cost

mod png;
mod raw;

pub use self::png::PngCodec;
pub use raw::{RawCodec, RAW_HEADER_LEN};

use image::RgbaImage;
use std::sync::Arc;
use thiserror::Error;

/// Encoding or decoding failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode {width}x{height} tile as {format}: {reason}")]
    Encode {
        format: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("failed to decode {len}-byte {format} payload: {reason}")]
    Decode {
        format: &'static str,
        len: usize,
        reason: String,
    },
}

/// Converts between tile pixels and wire bytes.
///
/// Implementations must be deterministic: encoding the same pixels twice
/// yields identical bytes, which keeps repeated runs byte-identical.
pub trait TileCodec: Send + Sync {
    fn encode(&self, pixels: &RgbaImage) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes produced by the guest. Any colour type the format can
    /// carry is widened to RGBA8.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError>;

    /// File extension for staged files, without the dot.
    fn extension(&self) -> &'static str;

    fn name(&self) -> &'static str;
}

impl<T: TileCodec + ?Sized> TileCodec for Arc<T> {
    fn encode(&self, pixels: &RgbaImage) -> Result<Vec<u8>, CodecError> {
        (**self).encode(pixels)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        (**self).decode(bytes)
    }

    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Codec selection by name, as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    #[default]
    Png,
    Raw,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn TileCodec> {
        match self {
            CodecKind::Png => Arc::new(PngCodec),
            CodecKind::Raw => Arc::new(RawCodec),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CodecKind::Png => "png",
            CodecKind::Raw => "raw",
        }
    }
}

impl std::str::FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(CodecKind::Png),
            "raw" | "rgba" => Ok(CodecKind::Raw),
            other => Err(format!("unknown codec '{}' (expected png or raw)", other)),
        }
    }
}
