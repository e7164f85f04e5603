//! Export modules
//!
//! Handles writing rendered frames:
//! - Bitmap: uncompressed 24-bit BMP, the reference output format
//! - Image: grayscale PNG through the `image` crate
//! - Naming: frame file names that sort in temporal order

pub mod bitmap;
pub mod image_export;
pub mod naming;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::render::RenderedFrame;

pub use bitmap::{encode_bmp, write_bmp};
pub use image_export::export_png;
pub use naming::frame_file_name;

/// Errors that can occur during export
#[derive(Debug)]
pub enum ExportError {
    /// Grid too large for the image format
    InvalidDimensions { width: u32, height: u32 },
    /// Failed to write or move the output file
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    /// Failed to encode the image
    Encode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::InvalidDimensions { width, height } => {
                write!(f, "Invalid dimensions: {}x{}", width, height)
            }
            ExportError::Io { path, error } => {
                write!(f, "Failed to write '{}': {}", path.display(), error)
            }
            ExportError::Encode(msg) => write!(f, "Failed to encode image: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Image format of written frames
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Uncompressed 24-bit bitmap
    #[default]
    Bmp,
    /// 8-bit grayscale PNG
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Bmp => "bmp",
            OutputFormat::Png => "png",
        }
    }
}

/// Sibling path a frame is written to before being renamed into place.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Move a fully written staging file to its final name.
///
/// On failure the staging file is removed and `path` is left as it was.
pub(crate) fn commit_staged(staging: &Path, path: &Path) -> Result<(), ExportError> {
    fs::rename(staging, path).map_err(|error| {
        let _ = fs::remove_file(staging);
        ExportError::Io {
            path: path.to_path_buf(),
            error,
        }
    })
}

/// Write `frame` into `dir` as `{prefix}_{time code}.{ext}` and return the path.
pub fn write_frame(
    frame: &RenderedFrame,
    dir: &Path,
    prefix: &str,
    format: OutputFormat,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(frame_file_name(prefix, frame.time, format));
    match format {
        OutputFormat::Bmp => write_bmp(&path, &frame.grid, frame.brightness)?,
        OutputFormat::Png => export_png(&path, &frame.grid, frame.brightness)?,
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_is_sibling() {
        let staging = staging_path(Path::new("/tmp/frames/run_1_0000003.bmp"));
        assert_eq!(staging, PathBuf::from("/tmp/frames/run_1_0000003.bmp.part"));
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(OutputFormat::default(), OutputFormat::Bmp);
        assert_eq!(OutputFormat::Png.extension(), "png");
        let parsed: OutputFormat = serde_json::from_str("\"png\"").unwrap();
        assert_eq!(parsed, OutputFormat::Png);
    }
}
