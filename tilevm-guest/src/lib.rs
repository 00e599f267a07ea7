//! Reference grayscale filter for tilevm.
//!
//! Built for `wasm32`, this crate is a guest module implementing the tilevm
//! zero-copy ABI:
//!
//! | Export          | Signature                                   |
//! |-----------------|---------------------------------------------|
//! | `memory`        | linear memory                               |
//! | `alloc`         | `(len) -> ptr`, 0 on failure                |
//! | `dealloc`       | `(ptr, len)`                                |
//! | `grayscale`     | `(in_ptr, in_len, out_params) -> out_len`   |
//! | `process_stdin` | stdin to stdout, for the process exchanges  |
//!
//! `grayscale` writes `(out_ptr, out_len)` as two little-endian u32 values
//! to `out_params` and returns `out_len`, or returns 0 on failure. The
//! output buffer comes from `alloc`; the host releases it with `dealloc`.
//!
//! Tiles may be PNG (the output is an 8-bit grayscale PNG) or the raw
//! format (`width`, `height` as little-endian u32, then RGBA8 pixels; the
//! output is raw RGBA with the luma in every color channel).
//!
//! Build it as a WASI module. `process_stdin` needs WASI stdio, and the
//! zero-copy host stubs the WASI imports it never calls:
//!
//! ```text
//! rustup target add wasm32-wasip1
//! cargo build -p tilevm-guest --target wasm32-wasip1 --release
//! ```
//!
//! The module lands in `target/wasm32-wasip1/release/tilevm_guest.wasm`.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::alloc::Layout;
use std::io::{Cursor, Read, Write};
use thiserror::Error;

/// Length of the raw tile header.
pub const RAW_HEADER_LEN: usize = 8;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Why a tile could not be filtered.
#[derive(Debug, Error)]
pub enum GuestFilterError {
    #[error("failed to load image: {0}")]
    Load(String),

    #[error("failed to encode PNG: {0}")]
    Encode(String),

    #[error("raw tile of {len} bytes does not match its {width}x{height} header")]
    RawLength { width: u32, height: u32, len: usize },
}

/// PNG in, grayscale PNG out.
pub fn grayscale_png(input: &[u8]) -> Result<Vec<u8>, GuestFilterError> {
    let image = image::load_from_memory_with_format(input, ImageFormat::Png)
        .map_err(|e| GuestFilterError::Load(e.to_string()))?;
    let gray = image.to_luma8();

    let mut out = Vec::new();
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| GuestFilterError::Encode(e.to_string()))?;
    Ok(out)
}

/// Raw RGBA in, raw RGBA out. Alpha is kept.
pub fn grayscale_raw(input: &[u8]) -> Result<Vec<u8>, GuestFilterError> {
    let image = decode_raw(input)?;
    // Same conversion as the PNG path, so both formats agree on luma.
    let luma = DynamicImage::ImageRgba8(image.clone()).to_luma8();
    let gray = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let l = luma.get_pixel(x, y).0[0];
        Rgba([l, l, l, image.get_pixel(x, y).0[3]])
    });

    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&gray.width().to_le_bytes());
    out.extend_from_slice(&gray.height().to_le_bytes());
    out.extend_from_slice(gray.as_raw());
    Ok(out)
}

/// Filter one encoded tile, picking the format from its first bytes.
pub fn filter_tile(input: &[u8]) -> Result<Vec<u8>, GuestFilterError> {
    if input.starts_with(PNG_MAGIC) {
        grayscale_png(input)
    } else {
        grayscale_raw(input)
    }
}

fn decode_raw(input: &[u8]) -> Result<RgbaImage, GuestFilterError> {
    if input.len() < RAW_HEADER_LEN {
        return Err(GuestFilterError::Load(format!(
            "{} bytes is too short for a tile header",
            input.len()
        )));
    }
    let width = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
    let height = u32::from_le_bytes([input[4], input[5], input[6], input[7]]);
    let pixels = input[RAW_HEADER_LEN..].to_vec();
    let expected = width as u64 * height as u64 * 4;
    if pixels.len() as u64 != expected {
        return Err(GuestFilterError::RawLength {
            width,
            height,
            len: input.len(),
        });
    }
    RgbaImage::from_raw(width, height, pixels).ok_or(GuestFilterError::RawLength {
        width,
        height,
        len: input.len(),
    })
}

fn layout(len: usize) -> Option<Layout> {
    if len == 0 {
        return None;
    }
    Layout::array::<u8>(len).ok()
}

/// Allocate `len` bytes of guest memory. Returns null for zero or on
/// allocation failure.
#[no_mangle]
pub extern "C" fn alloc(len: usize) -> *mut u8 {
    match layout(len) {
        // SAFETY: the layout has a non-zero size.
        Some(layout) => unsafe { std::alloc::alloc(layout) },
        None => std::ptr::null_mut(),
    }
}

/// Release a buffer returned by [`alloc`].
///
/// # Safety
///
/// `ptr` must come from `alloc(len)` with the same `len` and must not be
/// used afterwards.
#[no_mangle]
pub unsafe extern "C" fn dealloc(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    if let Some(layout) = layout(len) {
        std::alloc::dealloc(ptr, layout);
    }
}

/// Zero-copy entry point.
///
/// # Safety
///
/// `input_ptr` must point to `input_len` readable bytes and `out_params`
/// to 8 writable bytes, both in this module's memory.
#[no_mangle]
pub unsafe extern "C" fn grayscale(
    input_ptr: *const u8,
    input_len: usize,
    out_params: *mut u32,
) -> usize {
    if input_ptr.is_null() || out_params.is_null() {
        return 0;
    }
    let input = std::slice::from_raw_parts(input_ptr, input_len);
    let Ok(result) = filter_tile(input) else {
        return 0;
    };

    let out_ptr = alloc(result.len());
    if out_ptr.is_null() {
        return 0;
    }
    std::ptr::copy_nonoverlapping(result.as_ptr(), out_ptr, result.len());

    // Pointers are 32-bit on wasm32, the only architecture the host loads.
    out_params.write_unaligned((out_ptr as usize as u32).to_le());
    out_params.add(1).write_unaligned((result.len() as u32).to_le());
    result.len()
}

/// Read one encoded tile from stdin and write the filtered tile to stdout.
/// Exits with status 1 on failure.
#[no_mangle]
pub extern "C" fn process_stdin() {
    let mut input = Vec::new();
    let result = std::io::stdin()
        .read_to_end(&mut input)
        .map_err(|e| GuestFilterError::Load(e.to_string()))
        .and_then(|_| filter_tile(&input));

    match result {
        Ok(out) => {
            let mut stdout = std::io::stdout();
            if let Err(e) = stdout.write_all(&out).and_then(|_| stdout.flush()) {
                eprintln!("failed to write output: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
