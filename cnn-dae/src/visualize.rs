//! Grayscale image output and comparison plots.

use std::{fs, path::Path};

use image::{imageops, GrayImage, Luma};

use crate::error::{DaeError, DaeResult};

/// Gap in pixels between tiles of a comparison grid.
const GUTTER: u32 = 4;
const BACKGROUND: u8 = 128;

/// Converts values in `[0, 1]` to an 8-bit grayscale image.
pub fn to_gray_image(values: &[f32], width: usize, height: usize) -> DaeResult<GrayImage> {
    if values.len() != width * height {
        return Err(DaeError::InvalidConfiguration {
            reason: format!(
                "Cannot render {} values as a {width}x{height} image",
                values.len()
            ),
        });
    }
    let pixels = values
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
        DaeError::InvalidConfiguration {
            reason: format!("Failed to create a {width}x{height} image buffer"),
        }
    })
}

/// Saves values in `[0, 1]` as a grayscale PNG, creating parent directories.
pub fn save_gray(values: &[f32], width: usize, height: usize, path: &Path) -> DaeResult<()> {
    let img = to_gray_image(values, width, height)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DaeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    img.save(path).map_err(|source| DaeError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Tiles rows of equally sized grayscale images into a single figure.
#[derive(Debug, Clone)]
pub struct ComparisonGrid {
    width: usize,
    height: usize,
    rows: Vec<Vec<GrayImage>>,
}

impl ComparisonGrid {
    /// Creates an empty grid of `width x height` tiles.
    pub const fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: Vec::new(),
        }
    }

    /// Appends a row of images given as `[0, 1]` values.
    pub fn push_row<'a>(&mut self, images: impl IntoIterator<Item = &'a [f32]>) -> DaeResult<()> {
        let row = images
            .into_iter()
            .map(|values| to_gray_image(values, self.width, self.height))
            .collect::<DaeResult<Vec<_>>>()?;
        self.rows.push(row);
        Ok(())
    }

    pub fn render(&self) -> GrayImage {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let rows = self.rows.len() as u32;
        let (w, h) = (self.width as u32, self.height as u32);
        let mut canvas = GrayImage::from_pixel(
            columns * (w + GUTTER) + GUTTER,
            rows * (h + GUTTER) + GUTTER,
            Luma([BACKGROUND]),
        );
        for (r, row) in self.rows.iter().enumerate() {
            for (c, tile) in row.iter().enumerate() {
                let x = GUTTER + c as u32 * (w + GUTTER);
                let y = GUTTER + r as u32 * (h + GUTTER);
                imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
            }
        }
        canvas
    }

    pub fn save(&self, path: &Path) -> DaeResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| DaeError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.render().save(path).map_err(|source| DaeError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "saved comparison plot");
        Ok(())
    }
}
