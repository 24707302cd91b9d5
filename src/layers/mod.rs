//! Stateful layers.
//!
//! A [`Layer`] owns whatever scratch it needs between a forward pass and the
//! backward pass that follows it. The host drives every instance through the
//! same lifecycle:
//!
//! 1. [`Layer::reshape`] (or [`Layer::setup`]) whenever the input shape may
//!    have changed; this recomputes derived sizes and scratch buffers
//! 2. [`Layer::forward`]
//! 3. [`Layer::backward`], valid only right after a forward on the same
//!    instance with the same input
//!
//! Instances are not shared across threads; each one exclusively owns its
//! scratch.

use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::tensors::Blob;

mod gram;
pub use self::gram::GramLayer;

mod tv_loss;
pub use self::tv_loss::TvLossLayer;

/// A differentiable operator with one input and one output blob.
pub trait Layer<T: Float> {
    /// Registered type name.
    fn layer_type(&self) -> &'static str;

    /// Recomputes derived sizes and scratch for a new input shape.
    ///
    /// Returns the output shape.
    ///
    /// # Errors
    /// Fails on shapes the layer cannot handle.
    fn reshape(&mut self, bottom_shape: &[usize]) -> Result<Vec<usize>>;

    /// Computes `top.value` from `bottom.value`.
    ///
    /// # Errors
    /// Fails if the layer was never reshaped or a blob does not match the
    /// last reshape.
    fn forward(&mut self, bottom: &Blob<T>, top: &mut Blob<T>) -> Result<()>;

    /// Computes `bottom.grad` from `top.grad`.
    ///
    /// Does nothing at all when `propagate_down` is false.
    ///
    /// # Errors
    /// Fails if the layer was never reshaped, a blob does not match the last
    /// reshape, or the layer needs a preceding forward pass.
    fn backward(
        &mut self,
        top: &Blob<T>,
        propagate_down: bool,
        bottom: &mut Blob<T>,
    ) -> Result<()>;

    /// Reshapes the layer for `bottom` and resizes `top` to match.
    ///
    /// # Errors
    /// Propagates [`Layer::reshape`] errors; `top` is left untouched then.
    fn setup(&mut self, bottom: &Blob<T>, top: &mut Blob<T>) -> Result<()> {
        let top_shape = self.reshape(bottom.shape())?;
        top.reshape(&top_shape);
        Ok(())
    }
}

/// Shapes recorded at the last reshape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ShapePair {
    pub bottom: Vec<usize>,
    pub top: Vec<usize>,
}

impl ShapePair {
    /// Checks that both blobs still have the reshaped value and grad shapes.
    pub fn check<T: Float>(&self, bottom: &Blob<T>, top: &Blob<T>) -> Result<()> {
        check_shape(&self.bottom, &bottom.value.shape)?;
        check_shape(&self.bottom, &bottom.grad.shape)?;
        check_shape(&self.top, &top.value.shape)?;
        check_shape(&self.top, &top.grad.shape)
    }
}

fn check_shape(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LayerError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
