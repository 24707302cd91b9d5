use rayon::prelude::*;

use crate::float::Float;

/// Whether an operand is read as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    /// Use the operand as stored.
    No,
    /// Use the transpose of the operand.
    Yes,
}

/// Dense row-major general matrix multiply:
/// `C = alpha · op(A) · op(B) + beta · C`.
///
/// `op(A)` is `m×k`, `op(B)` is `k×n` and `C` is `m×n`. Leading dimensions
/// are implied by the stored shapes (`A` is stored `m×k`, or `k×m` when
/// transposed; likewise for `B`).
///
/// # Semantics
///
/// Matches BLAS: when `beta` is zero the previous contents of `C` are ignored
/// rather than multiplied, so stale NaNs in `C` do not leak into the result.
///
/// # Optimizations
///
/// - Uses `rayon` to compute rows of `C` in parallel; each element is
///   accumulated sequentially over `k`, so results are deterministic.
///
/// # Panics
///
/// - If any slice is shorter than its implied size.
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: Float>(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    b: &[T],
    beta: T,
    c: &mut [T],
) {
    assert!(a.len() >= m * k, "gemm: A holds {} < {}x{}", a.len(), m, k);
    assert!(b.len() >= k * n, "gemm: B holds {} < {}x{}", b.len(), k, n);
    assert!(c.len() >= m * n, "gemm: C holds {} < {}x{}", c.len(), m, n);

    if m == 0 || n == 0 {
        return;
    }

    let a_at = |i: usize, l: usize| match trans_a {
        Transpose::No => a[i * k + l],
        Transpose::Yes => a[l * m + i],
    };
    let b_at = |l: usize, j: usize| match trans_b {
        Transpose::No => b[l * n + j],
        Transpose::Yes => b[j * k + l],
    };

    c[..m * n]
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, out) in row.iter_mut().enumerate() {
                let mut sum = T::ZERO;
                for l in 0..k {
                    sum += a_at(i, l) * b_at(l, j);
                }
                *out = if beta == T::ZERO {
                    alpha * sum
                } else {
                    alpha * sum + beta * *out
                };
            }
        });
}
