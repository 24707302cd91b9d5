use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::tensors::count_range;

use super::gemm::{Transpose, gemm};

/// Derived sizes of a Gram computation.
///
/// The input is viewed as `groups` independent `rows × features` matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GramDims {
    /// Number of independent Gram matrices (`M`).
    pub groups: usize,
    /// Rows per matrix and side length of each output matrix (`N`).
    pub rows: usize,
    /// Flattened feature length per row (`K`).
    pub features: usize,
}

impl GramDims {
    /// Resolves `axis` against `shape` and derives the group layout.
    ///
    /// Negative axes count from the end. The canonical axis must lie in
    /// `[1, rank)`.
    ///
    /// # Errors
    ///
    /// - [`LayerError::InvalidAxis`] if `axis` is outside `[-rank, rank)`
    /// - [`LayerError::AxisBeforeFirst`] if it resolves to 0
    pub fn resolve(shape: &[usize], axis: i32) -> Result<(Self, usize)> {
        let rank = shape.len();
        let canonical = canonical_axis(axis, rank)?;
        if canonical == 0 {
            return Err(LayerError::AxisBeforeFirst { axis });
        }
        let dims = Self {
            groups: count_range(shape, 0, canonical - 1),
            rows: shape[canonical - 1],
            features: count_range(shape, canonical, rank),
        };
        Ok((dims, canonical))
    }

    /// Output shape: the leading `axis` dims followed by `rows`.
    pub fn output_shape(&self, shape: &[usize], canonical_axis: usize) -> Vec<usize> {
        let mut top = shape[..canonical_axis].to_vec();
        top.push(self.rows);
        top
    }

    /// Elements in one input group.
    pub const fn group_len(&self) -> usize {
        self.rows * self.features
    }

    /// Elements in one output matrix.
    pub const fn matrix_len(&self) -> usize {
        self.rows * self.rows
    }
}

/// Maps `axis` into `[0, rank)`.
fn canonical_axis(axis: i32, rank: usize) -> Result<usize> {
    let invalid = || LayerError::InvalidAxis { axis, rank };
    let rank_i = i64::try_from(rank).map_err(|_| invalid())?;
    let axis_i = i64::from(axis);
    if axis_i < -rank_i || axis_i >= rank_i {
        return Err(invalid());
    }
    let resolved = if axis_i < 0 { axis_i + rank_i } else { axis_i };
    usize::try_from(resolved).map_err(|_| invalid())
}

/// Writes `A·Aᵀ` for every group of `bottom` into `top`.
///
/// Each group is read as a row-major `rows × features` matrix `A`; the
/// matching `rows × rows` block of `top` is overwritten.
pub fn gram_forward<T: Float>(dims: GramDims, bottom: &[T], top: &mut [T]) {
    let (n, k) = (dims.rows, dims.features);
    let group_len = dims.group_len();
    for (g, out) in top
        .chunks_exact_mut(dims.matrix_len().max(1))
        .take(dims.groups)
        .enumerate()
    {
        // empty when K = 0; gemm still writes the zero matrix
        let a = &bottom[g * group_len..(g + 1) * group_len];
        gemm(Transpose::No, Transpose::Yes, n, n, k, T::ONE, a, a, T::ZERO, out);
    }
}

/// Writes `dA = G·A + Gᵀ·A` for every group into `bottom_diff`.
///
/// `top_diff` holds one `rows × rows` upstream gradient `G` per group. It is
/// not assumed symmetric. The previous contents of `bottom_diff` are
/// overwritten.
pub fn gram_backward<T: Float>(
    dims: GramDims,
    top_diff: &[T],
    bottom_data: &[T],
    bottom_diff: &mut [T],
) {
    let (n, k) = (dims.rows, dims.features);
    for ((g, a), da) in top_diff
        .chunks_exact(dims.matrix_len().max(1))
        .zip(bottom_data.chunks_exact(dims.group_len().max(1)))
        .zip(bottom_diff.chunks_exact_mut(dims.group_len().max(1)))
        .take(dims.groups)
    {
        gemm(Transpose::No, Transpose::No, n, k, n, T::ONE, g, a, T::ZERO, da);
        gemm(Transpose::Yes, Transpose::No, n, k, n, T::ONE, g, a, T::ONE, da);
    }
}
