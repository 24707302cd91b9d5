//! Finite-difference gradient checking for layers.
//!
//! For a chosen objective over the top blob the checker compares the gradient a
//! layer's backward pass writes into `bottom.grad` against central differences
//! of the forward pass:
//!
//! ```text
//! estimated = (f(x + h) - f(x - h)) / 2h
//! |computed - estimated| <= threshold * max(|computed|, |estimated|, 1)
//! ```
//!
//! # Example
//! ```rust
//! use style_layers::gradcheck::GradientChecker;
//! use style_layers::layers::GramLayer;
//! use style_layers::tensors::{Blob, Tensor};
//!
//! let mut layer = GramLayer::with_axis(1).unwrap();
//! let mut bottom = Blob::new(Tensor::new(vec![2, 3], vec![0.5_f64, -1.0, 2.0, 0.25, 1.5, -0.75]));
//! let mut top = Blob::zeros(vec![0]);
//! GradientChecker::new(1e-2, 1e-3)
//!     .check_exhaustive(&mut layer, &mut bottom, &mut top)
//!     .unwrap();
//! ```

use log::{debug, trace};
use thiserror::Error;

use crate::error::LayerError;
use crate::float::Float;
use crate::layers::Layer;
use crate::tensors::Blob;

/// Why a gradient check failed.
#[derive(Debug, Error)]
pub enum GradCheckError {
    /// The layer itself refused to run.
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// Analytic and numeric gradients disagree beyond the threshold.
    #[error(
        "gradient mismatch at bottom[{bottom_index}] for objective {objective:?}: \
         computed {computed}, estimated {estimated}"
    )]
    Mismatch {
        objective: Objective,
        bottom_index: usize,
        computed: f64,
        estimated: f64,
    },
}

/// Scalar objective the checker differentiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// A single top element, `top.value[i]`.
    Element(usize),
    /// Half the sum of squares over the whole top blob.
    HalfSquaredSum,
}

/// Central-difference gradient checker.
#[derive(Debug, Clone, Copy)]
pub struct GradientChecker<T> {
    stepsize: T,
    threshold: T,
}

impl<T: Float> Default for GradientChecker<T> {
    fn default() -> Self {
        Self::new(T::from_f64(1e-2), T::from_f64(1e-3))
    }
}

impl<T: Float> GradientChecker<T> {
    /// A checker perturbing by `stepsize` and accepting relative error up to `threshold`.
    pub const fn new(stepsize: T, threshold: T) -> Self {
        Self {
            stepsize,
            threshold,
        }
    }

    /// Checks every top element as its own objective.
    ///
    /// The layer is set up for `bottom` first; `top` is resized accordingly.
    ///
    /// # Errors
    /// The first mismatch found, or any layer error.
    pub fn check_exhaustive(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut Blob<T>,
        top: &mut Blob<T>,
    ) -> Result<(), GradCheckError> {
        layer.setup(bottom, top)?;
        let count = top.value.count();
        debug!(
            "exhaustive gradient check of {}: {} top x {} bottom elements",
            layer.layer_type(),
            count,
            bottom.value.count()
        );
        for index in 0..count {
            self.check(layer, bottom, top, Objective::Element(index))?;
        }
        Ok(())
    }

    /// Checks one objective. The layer must already be set up for `bottom`.
    ///
    /// # Errors
    /// A [`GradCheckError::Mismatch`] for the first disagreeing bottom element,
    /// or any layer error.
    pub fn check(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut Blob<T>,
        top: &mut Blob<T>,
        objective: Objective,
    ) -> Result<(), GradCheckError> {
        layer.forward(bottom, top)?;
        seed_top_grad(top, objective);
        bottom.zero_grad();
        layer.backward(top, true, bottom)?;
        let computed = bottom.grad.data.clone();

        let two = T::ONE + T::ONE;
        for (index, &computed) in computed.iter().enumerate() {
            let original = bottom.value.data[index];

            bottom.value.data[index] = original + self.stepsize;
            layer.forward(bottom, top)?;
            let positive = evaluate(top, objective);

            bottom.value.data[index] = original - self.stepsize;
            layer.forward(bottom, top)?;
            let negative = evaluate(top, objective);

            bottom.value.data[index] = original;
            let estimated = (positive - negative) / (two * self.stepsize);

            let scale = computed.abs().max(estimated.abs()).max(T::ONE);
            trace!("bottom[{index}]: computed {computed:?}, estimated {estimated:?}");
            let within = (computed - estimated).abs() <= self.threshold * scale;
            if !within {
                return Err(GradCheckError::Mismatch {
                    objective,
                    bottom_index: index,
                    computed: computed.into_f64(),
                    estimated: estimated.into_f64(),
                });
            }
        }
        Ok(())
    }
}

fn seed_top_grad<T: Float>(top: &mut Blob<T>, objective: Objective) {
    match objective {
        Objective::Element(index) => {
            top.zero_grad();
            top.grad.data[index] = T::ONE;
        }
        Objective::HalfSquaredSum => top.grad.data.copy_from_slice(&top.value.data),
    }
}

fn evaluate<T: Float>(top: &Blob<T>, objective: Objective) -> T {
    match objective {
        Objective::Element(index) => top.value.data[index],
        Objective::HalfSquaredSum => {
            let half = T::from_f64(0.5);
            top.value.data.iter().map(|&v| v * v * half).sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::GramLayer;
    use crate::tensors::Tensor;

    /// Gram layer whose backward forgets the transposed term.
    struct HalfGram(GramLayer);

    impl Layer<f64> for HalfGram {
        fn layer_type(&self) -> &'static str {
            "HalfGram"
        }

        fn reshape(&mut self, bottom_shape: &[usize]) -> crate::error::Result<Vec<usize>> {
            Layer::<f64>::reshape(&mut self.0, bottom_shape)
        }

        fn forward(&mut self, bottom: &Blob<f64>, top: &mut Blob<f64>) -> crate::error::Result<()> {
            self.0.forward(bottom, top)
        }

        fn backward(
            &mut self,
            top: &Blob<f64>,
            propagate_down: bool,
            bottom: &mut Blob<f64>,
        ) -> crate::error::Result<()> {
            self.0.backward(top, propagate_down, bottom)?;
            bottom.grad.data.iter_mut().for_each(|g| *g *= 0.5);
            Ok(())
        }
    }

    fn bottom() -> Blob<f64> {
        Blob::new(Tensor::new(vec![2, 3], vec![0.5, -1.0, 2.0, 0.25, 1.5, -0.75]))
    }

    #[test]
    fn correct_layer_passes_both_objectives() {
        let checker = GradientChecker::default();
        let mut layer = GramLayer::with_axis(1).unwrap();
        let mut bottom = bottom();
        let mut top = Blob::zeros(vec![0]);
        checker
            .check_exhaustive(&mut layer, &mut bottom, &mut top)
            .unwrap();
        checker
            .check(&mut layer, &mut bottom, &mut top, Objective::HalfSquaredSum)
            .unwrap();
    }

    #[test]
    fn wrong_backward_is_reported() {
        let mut layer = HalfGram(GramLayer::with_axis(1).unwrap());
        let mut bottom = bottom();
        let mut top = Blob::zeros(vec![0]);
        let err = GradientChecker::default()
            .check_exhaustive(&mut layer, &mut bottom, &mut top)
            .unwrap_err();
        assert!(matches!(
            err,
            GradCheckError::Mismatch {
                objective: Objective::Element(0),
                bottom_index: 0,
                ..
            }
        ));
    }

    #[test]
    fn inputs_are_restored_after_checking() {
        let mut layer = GramLayer::with_axis(1).unwrap();
        let mut bottom = bottom();
        let before = bottom.value.clone();
        let mut top = Blob::zeros(vec![0]);
        GradientChecker::default()
            .check_exhaustive(&mut layer, &mut bottom, &mut top)
            .unwrap();
        assert_eq!(bottom.value, before);
    }

    #[test]
    fn layer_errors_pass_through() {
        let mut layer = GramLayer::with_axis(5).unwrap();
        let mut bottom = bottom();
        let mut top = Blob::zeros(vec![0]);
        let err = GradientChecker::<f64>::default()
            .check_exhaustive(&mut layer, &mut bottom, &mut top)
            .unwrap_err();
        assert!(matches!(err, GradCheckError::Layer(LayerError::InvalidAxis { .. })));
    }
}
