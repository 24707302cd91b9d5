//! Differentiable operations with backward closures.
//!
//! # Functional API
//!
//! The layers in [`crate::layers`] keep their scratch between calls, the way a
//! host framework drives them. The functions here offer the same math in the
//! closure style:
//!
//! 1. **Inputs** are references to `Blob<T>` (`WithGrad<Tensor<T>>`).
//! 2. **Forward Pass** computes the output immediately.
//! 3. **Backward Pass** is returned as a closure capturing the state it needs.
//!
//! Unlike [`Layer::backward`](crate::layers::Layer::backward), the closures
//! return a fresh gradient and can be called any number of times.
//!
//! ## Usage Guidelines
//!
//! - Configuration problems (bad axis, tiny spatial grid, bad `beta`) are
//!   reported as errors before any work happens.
//! - The closures **panic** when handed an upstream gradient of the wrong shape.

use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::ops::cpu::{
    GramDims, TvScratch, gram_backward, gram_forward, spatial_dims, tv_backward, tv_forward,
};
use crate::tensors::{Blob, Tensor};

/// Gram matrices of `input` over `axis`.
///
/// # Returns
/// - `out`: tensor of shape `shape[..axis] ++ [N]`
/// - `back`: closure mapping `dL/d(out)` to `dL/d(input)`
///
/// # Errors
/// Fails if `axis` does not resolve into `[1, rank)`.
///
/// # Example
/// ```rust
/// use style_layers::{tensor, tensors::Blob};
/// use style_layers::backprop::gram;
///
/// let input = Blob::new(tensor!([[1.0, 2.0], [3.0, 4.0]]));
/// let (out, back) = gram(&input, 1).unwrap();
/// assert_eq!(out.data, vec![5.0, 11.0, 11.0, 25.0]);
/// let grad = back(&tensor!([[1.0, 0.0], [0.0, 0.0]]));
/// assert_eq!(grad.data, vec![2.0, 4.0, 0.0, 0.0]);
/// ```
pub fn gram<T: Float>(
    input: &Blob<T>,
    axis: i32,
) -> Result<(Tensor<T>, impl Fn(&Tensor<T>) -> Tensor<T> + '_)> {
    let shape = input.shape();
    let (dims, canonical) = GramDims::resolve(shape, axis)?;
    let out_shape = dims.output_shape(shape, canonical);

    let mut out = Tensor::zeros(out_shape.clone());
    gram_forward(dims, &input.value.data, &mut out.data);

    let back = move |grad_output: &Tensor<T>| {
        assert_eq!(grad_output.shape, out_shape, "gram: upstream gradient shape mismatch");
        let mut grad = Tensor::zeros(input.value.shape.clone());
        gram_backward(dims, &grad_output.data, &input.value.data, &mut grad.data);
        grad
    };

    Ok((out, back))
}

/// Total-variation penalty `Σ (dx² + dy²)^(beta/2)` over the trailing two axes.
///
/// # Returns
/// - Scalar loss
/// - Closure mapping `dL/dloss` to `dL/d(input)`
///
/// # Errors
/// Fails for inputs of rank < 2, spatial dims below 2, or a `beta` that is not
/// finite and positive.
pub fn tv_loss<T: Float>(input: &Blob<T>, beta: T) -> Result<(T, impl Fn(T) -> Tensor<T>)> {
    if !beta.is_finite() || beta <= T::ZERO {
        return Err(LayerError::InvalidParameter(format!(
            "tv loss beta must be finite and positive, got {beta:?}"
        )));
    }
    let shape = input.value.shape.clone();
    let (height, width) = spatial_dims(&shape)?;

    let mut scratch = TvScratch::new(input.value.count(), height, width);
    let loss = tv_forward(&input.value.data, width, beta, &mut scratch);

    let back = move |grad_output: T| {
        let mut consumed = scratch.clone();
        let mut grad = Tensor::zeros(shape.clone());
        tv_backward(width, beta, grad_output, &mut consumed, &mut grad.data);
        grad
    };

    Ok((loss, back))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tv_closure_is_repeatable() {
        let input = Blob::new(Tensor::new(vec![2, 2], vec![1.0_f64, 2.0, 4.0, 8.0]));
        let (loss, back) = tv_loss(&input, 2.0).unwrap();
        assert_eq!(loss, 10.0);
        let first = back(1.0);
        let second = back(1.0);
        assert_eq!(first, second);
        assert_eq!(first.data, vec![-8.0, 2.0, 6.0, 0.0]);
        assert_eq!(back(0.5).data, vec![-4.0, 1.0, 3.0, 0.0]);
    }

    #[test]
    fn tv_rejects_bad_beta() {
        let input = Blob::<f32>::zeros(vec![2, 2]);
        assert!(matches!(
            tv_loss(&input, 0.0),
            Err(LayerError::InvalidParameter(_))
        ));
        assert!(tv_loss(&input, f32::NAN).is_err());
    }

    #[test]
    fn gram_rejects_axis_zero() {
        let input = Blob::<f64>::zeros(vec![2, 2]);
        assert!(matches!(
            gram(&input, 0),
            Err(LayerError::AxisBeforeFirst { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "upstream gradient shape mismatch")]
    fn gram_closure_checks_gradient_shape() {
        let input = Blob::new(Tensor::new(vec![2, 2], vec![1.0_f64, 2.0, 3.0, 4.0]));
        let (_, back) = gram(&input, 1).unwrap();
        let _ = back(&Tensor::zeros(vec![3, 3]));
    }
}
