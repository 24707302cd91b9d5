//! Parallel CPU kernels
//!
//! # CPU Backend
//!
//! These are the reference implementations used by [`crate::layers`] and
//! [`crate::backprop`].
//!
//! ## Implemented Ops
//!
//! - `gemm`: BLAS-style matrix multiply with transpose flags
//! - `gram_forward` / `gram_backward`: batched `A·Aᵀ` and its adjoint
//! - `create_mask` / `tv_forward` / `tv_backward`: masked total variation
//!
//! ## Design Goals
//!
//! - Deterministic results: reductions run sequentially, `rayon` only splits
//!   independent rows and elements
//! - Modular: kernels never allocate the buffers they write

mod gemm;
pub use self::gemm::{Transpose, gemm};

mod gram;
pub use self::gram::{GramDims, gram_backward, gram_forward};

mod tv_loss;
pub use self::tv_loss::{TvScratch, create_mask, spatial_dims, tv_backward, tv_forward};
