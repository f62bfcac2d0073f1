//! Loading image directories as patch tensors.
//!
//! Images are read in file-name order, converted to single-channel `f32`
//! values in `[0, 1]` and cut into non-overlapping square patches. The
//! patches of all images are concatenated image by image, so the patches of
//! image `i` occupy the range `i * P..(i + 1) * P` where `P` is the number of
//! patches per image.

use std::path::{Path, PathBuf};

use patch_ops::{extract_patches, PatchTensor};
use walkdir::WalkDir;

use crate::error::{DaeError, DaeResult};

const VALID_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Patches cut from a directory of equally sized images.
#[derive(Debug, Clone)]
pub struct ImagePatches {
    pub patches: PatchTensor,
    pub width: usize,
    pub height: usize,
    pub images: usize,
}

impl ImagePatches {
    pub const fn patches_per_image(&self) -> usize {
        (self.width / self.patches.side()) * (self.height / self.patches.side())
    }

    /// Patch index range belonging to image `index`.
    pub const fn image_range(&self, index: usize) -> core::ops::Range<usize> {
        let per_image = self.patches_per_image();
        index * per_image..(index + 1) * per_image
    }
}

/// Lists the image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> DaeResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DaeError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| DaeError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if entry.file_type().is_file() && is_image {
            images.push(path.to_path_buf());
        }
    }
    Ok(images)
}

/// Opens an image as row-major grayscale values in `[0, 1]`.
pub fn load_gray(path: &Path) -> DaeResult<(Vec<f32>, u32, u32)> {
    let img = image::open(path).map_err(|source| DaeError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let gray = img.to_luma32f();
    let (width, height) = gray.dimensions();
    Ok((gray.into_raw(), width, height))
}

/// Loads the first `num_images` images of `dir` and cuts them into
/// non-overlapping patches of side `patch_size`.
pub fn load_patches(dir: &Path, num_images: usize, patch_size: usize) -> DaeResult<ImagePatches> {
    let files = list_images(dir)?;
    if files.len() < num_images || num_images == 0 {
        return Err(DaeError::NotEnoughImages {
            path: dir.to_path_buf(),
            expected: num_images,
            found: files.len(),
        });
    }

    let mut parts = Vec::with_capacity(num_images);
    let mut dims = None;
    for path in &files[..num_images] {
        let (pixels, width, height) = load_gray(path)?;
        match dims {
            None => dims = Some((width, height)),
            Some(expected) if expected != (width, height) => {
                return Err(DaeError::InconsistentImageSize {
                    path: path.clone(),
                    expected,
                    actual: (width, height),
                });
            }
            Some(_) => {}
        }
        parts.push(extract_patches(
            &pixels,
            width as usize,
            height as usize,
            patch_size,
            patch_size,
        )?);
    }

    let (width, height) = dims.unwrap_or_default();
    let patches = PatchTensor::concat(parts, patch_size)?;
    tracing::info!(
        dir = %dir.display(),
        images = num_images,
        patches = patches.len(),
        shape = ?patches.shape(),
        "loaded image patches"
    );

    Ok(ImagePatches {
        patches,
        width: width as usize,
        height: height as usize,
        images: num_images,
    })
}
