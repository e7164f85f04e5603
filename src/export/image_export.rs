//! Grayscale PNG export through the `image` crate

use std::path::Path;

use image::{GrayImage, ImageError, ImageFormat, Luma};

use super::{ExportError, commit_staged, staging_path};
use crate::render::AccumulationGrid;

/// Convert a grid to an 8-bit grayscale image, `min(255, count * scale)` per pixel.
pub fn grid_to_image(grid: &AccumulationGrid, scale: u32) -> Result<GrayImage, ExportError> {
    let width = grid.width();
    if width == 0 {
        return Err(ExportError::InvalidDimensions {
            width,
            height: width,
        });
    }
    Ok(GrayImage::from_fn(width, width, |x, y| {
        Luma([grid.brightness(x, y, scale)])
    }))
}

/// Export a grid to a PNG file
///
/// # Arguments
/// * `path` - Output file path
/// * `grid` - Accumulated landing counts
/// * `scale` - Gray level per landing
pub fn export_png<P: AsRef<Path>>(
    path: P,
    grid: &AccumulationGrid,
    scale: u32,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let image = grid_to_image(grid, scale)?;

    let staging = staging_path(path);
    image
        .save_with_format(&staging, ImageFormat::Png)
        .map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            match e {
                ImageError::IoError(error) => ExportError::Io {
                    path: staging.clone(),
                    error,
                },
                other => ExportError::Encode(other.to_string()),
            }
        })?;
    commit_staged(&staging, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_grid_to_image() {
        let mut grid = AccumulationGrid::new(3).unwrap();
        grid.increment(2, 1);
        grid.increment(2, 1);
        let image = grid_to_image(&grid, 8).unwrap();
        assert_eq!(image.dimensions(), (3, 3));
        assert_eq!(image.get_pixel(2, 1).0, [16]);
        assert_eq!(image.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn test_invalid_dimensions() {
        let grid = AccumulationGrid::new(0).unwrap();
        let result = grid_to_image(&grid, 8);
        assert!(matches!(result, Err(ExportError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_export_png_roundtrip() {
        let mut grid = AccumulationGrid::new(4).unwrap();
        grid.increment(1, 3);
        let path = std::env::temp_dir().join("caustic_waves_export_test.png");
        export_png(&path, &grid, 40).unwrap();

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (4, 4));
        assert_eq!(loaded.get_pixel(1, 3).0, [40]);
        assert_eq!(loaded.get_pixel(3, 1).0, [0]);

        // Clean up
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_png_into_missing_directory_is_io_error() {
        let grid = AccumulationGrid::new(2).unwrap();
        let result = export_png("/nonexistent/caustic_waves/frame.png", &grid, 8);
        match result {
            Err(ExportError::Io { path, error }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/caustic_waves/frame.png.part"));
                assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected an IO error, got {:?}", other),
        }
    }
}
