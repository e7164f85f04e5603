//! Uncompressed 24-bit BMP encoding of accumulation grids.
//!
//! Layout:
//!
//! ```text
//! offset  size  field
//!      0    14  file header: "BM", total file size, reserved, pixel offset (54)
//!     14    40  info header: header size, width, height, planes (1), bpp (24),
//!               compression (0), pixel data size, resolution, palette (0)
//!     54     -  pixel rows, bottom row first, each padded to 4 bytes
//! ```
//!
//! The bytes are produced by the `image` crate's BMP encoder from an RGB
//! buffer. Every pixel is gray: `min(255, count * scale)` in all three channels.
//! Grid row 0 is the top row of the picture.

use std::fs;
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::{ExtendedColorType, Rgb, RgbImage};

use super::{ExportError, commit_staged, staging_path};
use crate::render::AccumulationGrid;

/// Encode `grid` as a grayscale 24-bit bitmap.
pub fn encode_bmp(grid: &AccumulationGrid, scale: u32) -> Result<Vec<u8>, ExportError> {
    let width = grid.width();
    if width == 0 {
        return Err(ExportError::InvalidDimensions {
            width,
            height: width,
        });
    }
    let image = RgbImage::from_fn(width, width, |x, y| {
        let v = grid.brightness(x, y, scale);
        Rgb([v, v, v])
    });

    let mut bytes = Vec::new();
    BmpEncoder::new(&mut bytes)
        .encode(image.as_raw(), width, width, ExtendedColorType::Rgb8)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Encode `grid` and write it to `path`.
///
/// The bytes go to a sibling staging file first, so a failed write never
/// leaves a truncated bitmap under `path`.
pub fn write_bmp<P: AsRef<Path>>(
    path: P,
    grid: &AccumulationGrid,
    scale: u32,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let bytes = encode_bmp(grid, scale)?;
    let staging = staging_path(path);
    fs::write(&staging, bytes).map_err(|error| {
        let _ = fs::remove_file(&staging);
        ExportError::Io {
            path: staging.clone(),
            error,
        }
    })?;
    commit_staged(&staging, path)
}
