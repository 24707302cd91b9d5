use rayon::prelude::*;

use crate::error::{LayerError, Result};
use crate::float::Float;

/// Scratch buffers retained between a TV loss forward pass and its backward pass.
///
/// All buffers have the input's element count. `mask` depends only on the
/// spatial shape; the others are rewritten by every forward and consumed in
/// place by backward.
#[derive(Debug, Clone, PartialEq)]
pub struct TvScratch<T> {
    /// 1 where a pixel has both a right and a bottom neighbour, else 0.
    pub mask: Vec<T>,
    /// Masked horizontal differences `x[i] - x[i+1]`.
    pub x_diff: Vec<T>,
    /// Masked vertical differences `x[i] - x[i+W]`.
    pub y_diff: Vec<T>,
    /// `x_diff² + y_diff²` after forward.
    pub grad_norm: Vec<T>,
    /// Powered norms after forward.
    pub tmp: Vec<T>,
}

impl<T: Float> TvScratch<T> {
    /// Zero-initialized scratch for `count` elements with the mask built for
    /// an `height × width` spatial grid.
    pub fn new(count: usize, height: usize, width: usize) -> Self {
        let mut mask = vec![T::ZERO; count];
        create_mask(&mut mask, height, width);
        Self {
            mask,
            x_diff: vec![T::ZERO; count],
            y_diff: vec![T::ZERO; count],
            grad_norm: vec![T::ZERO; count],
            tmp: vec![T::ZERO; count],
        }
    }

    /// Element count covered by the buffers.
    pub fn count(&self) -> usize {
        self.mask.len()
    }
}

/// Reads the spatial grid `(H, W)` from the two trailing axes of `shape`.
///
/// # Errors
///
/// - [`LayerError::RankTooLow`] for inputs with fewer than two axes
/// - [`LayerError::SpatialTooSmall`] if either spatial dim is below 2
pub fn spatial_dims(shape: &[usize]) -> Result<(usize, usize)> {
    let rank = shape.len();
    if rank < 2 {
        return Err(LayerError::RankTooLow { rank, min: 2 });
    }
    let (height, width) = (shape[rank - 2], shape[rank - 1]);
    if height < 2 || width < 2 {
        return Err(LayerError::SpatialTooSmall { height, width });
    }
    Ok((height, width))
}

/// Fills `mask` with 0 on the last row and last column of every
/// `height × width` slice, and 1 elsewhere.
pub fn create_mask<T: Float>(mask: &mut [T], height: usize, width: usize) {
    let size = height * width;
    mask.par_iter_mut().enumerate().for_each(|(i, m)| {
        let unit_pos = i % size;
        *m = if unit_pos % width == width - 1 || unit_pos / width == height - 1 {
            T::ZERO
        } else {
            T::ONE
        };
    });
}

/// Computes the TV penalty of `data`, filling `scratch` for backward.
///
/// The tensor is treated as one flat signal: horizontal differences pair each
/// element with the next one, vertical differences with the element `width`
/// further on. Pairs that straddle a row, channel or image boundary are only
/// suppressed where the mask is zero, which covers the last column and last
/// row of every slice.
///
/// Returns `Σ (x_diff² + y_diff²)^(beta/2)`.
pub fn tv_forward<T: Float>(data: &[T], width: usize, beta: T, scratch: &mut TvScratch<T>) -> T {
    let count = data.len();
    debug_assert_eq!(count, scratch.count());
    if count == 0 {
        return T::ZERO;
    }
    let TvScratch {
        mask,
        x_diff,
        y_diff,
        grad_norm,
        tmp,
    } = scratch;

    let x_len = count.saturating_sub(1);
    x_diff[..x_len]
        .par_iter_mut()
        .zip(data[..x_len].par_iter().zip(&data[1..]))
        .for_each(|(d, (&a, &b))| *d = a - b);
    // tails have no partner; they are masked anyway but must not carry stale values
    x_diff[x_len..].iter_mut().for_each(|d| *d = T::ZERO);
    mul_in_place(x_diff, &mask[..]);

    let y_len = count.saturating_sub(width);
    y_diff[..y_len]
        .par_iter_mut()
        .zip(data[..y_len].par_iter().zip(&data[width.min(count)..]))
        .for_each(|(d, (&a, &b))| *d = a - b);
    y_diff[y_len..].iter_mut().for_each(|d| *d = T::ZERO);
    mul_in_place(y_diff, &mask[..]);

    grad_norm
        .par_iter_mut()
        .zip(x_diff.par_iter())
        .for_each(|(g, &x)| *g = x * x);
    tmp.par_iter_mut()
        .zip(y_diff.par_iter())
        .for_each(|(t, &y)| *t = y * y);
    grad_norm
        .par_iter_mut()
        .zip(tmp.par_iter())
        .for_each(|(g, &y2)| *g = y2 + *g);

    let half_beta = beta / T::from_f64(2.0);
    tmp.par_iter_mut()
        .zip(grad_norm.par_iter())
        .for_each(|(t, &g)| *t = g.powf(half_beta));

    tmp.iter().map(|t| t.abs()).sum()
}

/// Accumulates the TV penalty gradient into `bottom_diff`, then scales the
/// whole buffer by `top_diff`.
///
/// Consumes `scratch`: `grad_norm`, `x_diff` and `y_diff` are overwritten with
/// intermediate derivatives, so a second call needs a fresh [`tv_forward`].
/// Existing contents of `bottom_diff` are kept and scaled along with the new
/// contribution.
pub fn tv_backward<T: Float>(
    width: usize,
    beta: T,
    top_diff: T,
    scratch: &mut TvScratch<T>,
    bottom_diff: &mut [T],
) {
    let count = bottom_diff.len();
    debug_assert_eq!(count, scratch.count());
    if count == 0 {
        return;
    }
    let two = T::from_f64(2.0);
    let half_beta = beta / two;
    let TvScratch {
        x_diff,
        y_diff,
        grad_norm,
        ..
    } = scratch;

    // d/dn of n^(beta/2)
    let exponent = half_beta - T::ONE;
    grad_norm
        .par_iter_mut()
        .for_each(|g| *g = g.powf(exponent) * half_beta);

    // dX_diff, dY_diff
    x_diff
        .par_iter_mut()
        .zip(grad_norm.par_iter())
        .for_each(|(x, &g)| *x = two * (*x * g));
    y_diff
        .par_iter_mut()
        .zip(grad_norm.par_iter())
        .for_each(|(y, &g)| *y = two * (*y * g));

    axpy(T::ONE, &x_diff[..], bottom_diff);
    axpy(T::ONE, &y_diff[..], bottom_diff);
    let x_len = count.saturating_sub(1);
    axpy(-T::ONE, &x_diff[..x_len], &mut bottom_diff[count - x_len..]);
    let y_len = count.saturating_sub(width);
    axpy(-T::ONE, &y_diff[..y_len], &mut bottom_diff[count - y_len..]);

    bottom_diff.par_iter_mut().for_each(|b| *b *= top_diff);
}

fn mul_in_place<T: Float>(values: &mut [T], mask: &[T]) {
    values
        .par_iter_mut()
        .zip(mask.par_iter())
        .for_each(|(v, &m)| *v *= m);
}

/// `y += alpha * x` over the shorter of the two slices.
fn axpy<T: Float>(alpha: T, x: &[T], y: &mut [T]) {
    y.par_iter_mut()
        .zip(x.par_iter())
        .for_each(|(y, &x)| *y += alpha * x);
}
