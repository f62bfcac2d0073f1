//! # Patch Tensors
//!
//! A `PatchTensor` stores `N` single-channel square patches of side `S` as one
//! contiguous row-major buffer with logical shape `(N, 1, S, S)`.

use core::ops::Range;

use crate::error::{PatchError, PatchResult};

/// A stack of single-channel square patches with shape `(N, 1, S, S)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchTensor {
    data: Vec<f32>,
    len: usize,
    side: usize,
}

impl PatchTensor {
    /// Creates a patch tensor from a flat buffer of `len * side * side` values.
    pub fn new(data: Vec<f32>, len: usize, side: usize) -> PatchResult<Self> {
        if side == 0 {
            return Err(PatchError::ZeroPatchSize);
        }
        let expected = len * side * side;
        if data.len() != expected {
            return Err(PatchError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, len, side })
    }

    /// Creates a patch tensor from a flat buffer, inferring the patch count.
    pub fn from_flat(data: Vec<f32>, side: usize) -> PatchResult<Self> {
        if side == 0 {
            return Err(PatchError::ZeroPatchSize);
        }
        let dim = side * side;
        if data.len() % dim != 0 {
            return Err(PatchError::ShapeMismatch {
                expected: (data.len() / dim + 1) * dim,
                actual: data.len(),
            });
        }
        let len = data.len() / dim;
        Ok(Self { data, len, side })
    }

    /// Concatenates patch tensors of equal side length along the patch axis.
    pub fn concat(parts: Vec<Self>, side: usize) -> PatchResult<Self> {
        let mut data = Vec::with_capacity(parts.iter().map(|p| p.data.len()).sum());
        let mut len = 0;
        for part in parts {
            if part.side != side {
                return Err(PatchError::ShapeMismatch {
                    expected: side * side,
                    actual: part.patch_dim(),
                });
            }
            len += part.len;
            data.extend(part.data);
        }
        Self::new(data, len, side)
    }

    /// Number of patches `N`.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Patch side length `S`.
    pub const fn side(&self) -> usize {
        self.side
    }

    /// Length of one flattened patch, `S * S`.
    pub const fn patch_dim(&self) -> usize {
        self.side * self.side
    }

    /// Logical shape `[N, 1, S, S]`.
    pub const fn shape(&self) -> [usize; 4] {
        [self.len, 1, self.side, self.side]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns the flattened pixels of patch `index`.
    pub fn patch(&self, index: usize) -> PatchResult<&[f32]> {
        if index >= self.len {
            return Err(PatchError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        let dim = self.patch_dim();
        Ok(&self.data[index * dim..(index + 1) * dim])
    }

    /// Gathers the given patches into a flat `[indices.len(), S * S]` buffer,
    /// one row per index in the order given.
    pub fn gather(&self, indices: &[usize]) -> PatchResult<Vec<f32>> {
        let mut out = Vec::with_capacity(indices.len() * self.patch_dim());
        for &index in indices {
            out.extend_from_slice(self.patch(index)?);
        }
        Ok(out)
    }

    /// Copies out the patches in `range`.
    pub fn slice(&self, range: Range<usize>) -> PatchResult<Self> {
        if range.end > self.len || range.start > range.end {
            return Err(PatchError::IndexOutOfBounds {
                index: range.end,
                len: self.len,
            });
        }
        let dim = self.patch_dim();
        Self::new(
            self.data[range.start * dim..range.end * dim].to_vec(),
            range.len(),
            self.side,
        )
    }

    /// Splits into the first `n` patches and the rest, consuming `self`.
    pub fn split_at(mut self, n: usize) -> PatchResult<(Self, Self)> {
        if n > self.len {
            return Err(PatchError::IndexOutOfBounds {
                index: n,
                len: self.len,
            });
        }
        let tail = self.data.split_off(n * self.patch_dim());
        let tail = Self::new(tail, self.len - n, self.side)?;
        self.len = n;
        Ok((self, tail))
    }

    /// Applies `f` to every value, producing a tensor of the same shape.
    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|&v| f(v)).collect(),
            len: self.len,
            side: self.side,
        }
    }
}

/// Crops square patches out of a single-channel row-major image.
///
/// Patches are taken in row-major grid order with the given stride; partial
/// patches along the right and bottom edges are dropped.
pub fn extract_patches(
    pixels: &[f32],
    width: usize,
    height: usize,
    patch_size: usize,
    stride: usize,
) -> PatchResult<PatchTensor> {
    if patch_size == 0 || stride == 0 {
        return Err(PatchError::ZeroPatchSize);
    }
    if pixels.len() != width * height {
        return Err(PatchError::ShapeMismatch {
            expected: width * height,
            actual: pixels.len(),
        });
    }
    if patch_size > width || patch_size > height {
        return Err(PatchError::PatchLargerThanImage {
            patch_size,
            width,
            height,
        });
    }

    let rows = (height - patch_size) / stride + 1;
    let cols = (width - patch_size) / stride + 1;
    let mut data = Vec::with_capacity(rows * cols * patch_size * patch_size);
    for row in 0..rows {
        for col in 0..cols {
            let top = row * stride;
            let left = col * stride;
            for y in top..top + patch_size {
                data.extend_from_slice(&pixels[y * width + left..y * width + left + patch_size]);
            }
        }
    }

    PatchTensor::new(data, rows * cols, patch_size)
}

/// Writes non-overlapping patches back into a `width x height` image.
///
/// This is the inverse of [`extract_patches`] with `stride == patch_size`.
pub fn reassemble(patches: &PatchTensor, width: usize, height: usize) -> PatchResult<Vec<f32>> {
    let side = patches.side();
    let cols = width / side;
    let rows = height / side;
    if rows * cols != patches.len() {
        return Err(PatchError::ShapeMismatch {
            expected: rows * cols,
            actual: patches.len(),
        });
    }

    let mut pixels = vec![0.0; width * height];
    for (k, patch) in patches.as_slice().chunks_exact(side * side).enumerate() {
        let top = (k / cols) * side;
        let left = (k % cols) * side;
        for (dy, line) in patch.chunks_exact(side).enumerate() {
            let start = (top + dy) * width + left;
            pixels[start..start + side].copy_from_slice(line);
        }
    }
    Ok(pixels)
}
