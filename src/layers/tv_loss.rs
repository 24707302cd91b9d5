use log::{debug, trace, warn};

use crate::config::{LayerParameter, TvLossParameter};
use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::ops::cpu::{TvScratch, spatial_dims, tv_backward, tv_forward};
use crate::tensors::Blob;

use super::{Layer, ShapePair};

/// Computes Total Variation loss, as described in
/// "Understanding Deep Image Representations by Inverting Them"
/// (Mahendran & Vedaldi, CVPR 2015).
///
/// The two trailing axes of the input form an `H×W` grid. Every pixel with
/// both a right and a bottom neighbour contributes `(dx² + dy²)^(beta/2)`;
/// the output is the scalar sum (a rank-0 blob).
///
/// Backward accumulates into the input gradient and then scales the whole
/// gradient buffer by the scalar upstream gradient `top.grad[0]`.
#[derive(Debug, Clone)]
pub struct TvLossLayer<T> {
    param: TvLossParameter,
    width: usize,
    scratch: Option<TvScratch<T>>,
    shapes: ShapePair,
    forwarded: bool,
}

impl<T: Float> TvLossLayer<T> {
    /// Builds the layer from a validated `tv_loss_param` block.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] unless `beta` is finite and positive.
    pub fn new(param: &LayerParameter) -> Result<Self> {
        let param = param.trusted_tv_loss()?;
        if param.beta < 2.0 {
            warn!(
                "tv loss beta {} < 2: gradients are non-finite wherever dx and dy both vanish",
                param.beta
            );
        }
        Ok(Self {
            param,
            width: 0,
            scratch: None,
            shapes: ShapePair::default(),
            forwarded: false,
        })
    }

    /// Shorthand for a layer with exponent `beta`.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] unless `beta` is finite and positive.
    pub fn with_beta(beta: f64) -> Result<Self> {
        Self::new(&LayerParameter::tv_loss(beta))
    }

    /// Configured exponent.
    pub const fn beta(&self) -> f64 {
        self.param.beta
    }

    /// Validity mask built at the last reshape.
    pub fn mask(&self) -> Option<&[T]> {
        self.scratch.as_ref().map(|s| s.mask.as_slice())
    }

    /// Scratch retained from the last forward pass.
    pub const fn scratch(&self) -> Option<&TvScratch<T>> {
        self.scratch.as_ref()
    }
}

impl<T: Float> Layer<T> for TvLossLayer<T> {
    fn layer_type(&self) -> &'static str {
        "TVLoss"
    }

    fn reshape(&mut self, bottom_shape: &[usize]) -> Result<Vec<usize>> {
        let (height, width) = spatial_dims(bottom_shape)?;
        let count = bottom_shape.iter().product();
        debug!(
            "tv loss reshape: bottom {:?} -> H={} W={}, {} elements",
            bottom_shape, height, width, count
        );
        self.width = width;
        self.scratch = Some(TvScratch::new(count, height, width));
        self.shapes = ShapePair {
            bottom: bottom_shape.to_vec(),
            top: Vec::new(),
        };
        self.forwarded = false;
        Ok(Vec::new())
    }

    fn forward(&mut self, bottom: &Blob<T>, top: &mut Blob<T>) -> Result<()> {
        let scratch = self.scratch.as_mut().ok_or(LayerError::NotReshaped)?;
        self.shapes.check(bottom, top)?;
        let beta = T::from_f64(self.param.beta);
        let loss = tv_forward(&bottom.value.data, self.width, beta, scratch);
        trace!("tv loss forward: {:?}", loss);
        top.value.data[0] = loss;
        self.forwarded = true;
        Ok(())
    }

    fn backward(
        &mut self,
        top: &Blob<T>,
        propagate_down: bool,
        bottom: &mut Blob<T>,
    ) -> Result<()> {
        if !propagate_down {
            trace!("tv loss backward skipped: propagation disabled");
            return Ok(());
        }
        let scratch = self.scratch.as_mut().ok_or(LayerError::NotReshaped)?;
        self.shapes.check(bottom, top)?;
        if !self.forwarded {
            return Err(LayerError::BackwardBeforeForward);
        }
        let beta = T::from_f64(self.param.beta);
        let top_diff = top.grad.data[0];
        trace!("tv loss backward: top diff {:?}", top_diff);
        tv_backward(self.width, beta, top_diff, scratch, &mut bottom.grad.data);
        self.forwarded = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Tensor;

    fn image() -> Blob<f64> {
        Blob::new(Tensor::new(vec![1, 1, 2, 2], vec![1.0, 2.0, 4.0, 8.0]))
    }

    #[test]
    fn output_is_a_scalar() {
        let mut layer = TvLossLayer::<f64>::with_beta(2.0).unwrap();
        let bottom = image();
        let mut top = Blob::zeros(vec![3]);
        layer.setup(&bottom, &mut top).unwrap();
        assert!(top.shape().is_empty());
        assert_eq!(top.value.count(), 1);
    }

    #[test]
    fn reshape_rejects_degenerate_grids() {
        let mut layer = TvLossLayer::<f32>::with_beta(2.0).unwrap();
        assert!(matches!(
            layer.reshape(&[1, 3, 1, 10]),
            Err(LayerError::SpatialTooSmall { height: 1, width: 10 })
        ));
        assert!(matches!(
            layer.reshape(&[7]),
            Err(LayerError::RankTooLow { .. })
        ));
    }

    #[test]
    fn second_backward_needs_a_new_forward() {
        let mut layer = TvLossLayer::<f64>::with_beta(2.0).unwrap();
        let mut bottom = image();
        let mut top = Blob::zeros(vec![0]);
        layer.setup(&bottom, &mut top).unwrap();
        layer.forward(&bottom, &mut top).unwrap();
        assert_eq!(top.value.data[0], 10.0);

        top.grad.data[0] = 1.0;
        layer.backward(&top, true, &mut bottom).unwrap();
        assert_eq!(bottom.grad.data, vec![-8.0, 2.0, 6.0, 0.0]);
        assert!(matches!(
            layer.backward(&top, true, &mut bottom),
            Err(LayerError::BackwardBeforeForward)
        ));

        bottom.zero_grad();
        layer.forward(&bottom, &mut top).unwrap();
        layer.backward(&top, true, &mut bottom).unwrap();
        assert_eq!(bottom.grad.data, vec![-8.0, 2.0, 6.0, 0.0]);
    }

    #[test]
    fn backward_without_propagation_touches_nothing() {
        let mut layer = TvLossLayer::<f64>::with_beta(2.0).unwrap();
        let mut bottom = image();
        let mut top = Blob::zeros(vec![0]);
        layer.setup(&bottom, &mut top).unwrap();
        layer.forward(&bottom, &mut top).unwrap();
        let before = layer.scratch().cloned();
        bottom.grad.data.fill(3.0);
        top.grad.data[0] = 1.0;
        layer.backward(&top, false, &mut bottom).unwrap();
        assert_eq!(bottom.grad.data, vec![3.0; 4]);
        assert_eq!(layer.scratch().cloned(), before);
    }

    #[test]
    fn upstream_gradient_scales_the_result() {
        let mut layer = TvLossLayer::<f64>::with_beta(2.0).unwrap();
        let mut bottom = image();
        let mut top = Blob::zeros(vec![0]);
        layer.setup(&bottom, &mut top).unwrap();
        layer.forward(&bottom, &mut top).unwrap();
        top.grad.data[0] = -2.0;
        layer.backward(&top, true, &mut bottom).unwrap();
        assert_eq!(bottom.grad.data, vec![16.0, -4.0, -12.0, 0.0]);
    }

    #[test]
    fn unreshaped_layer_reports_not_reshaped() {
        let mut layer = TvLossLayer::<f64>::with_beta(2.0).unwrap();
        let mut bottom = image();
        let mut top = Blob::zeros(vec![0]);
        assert!(matches!(
            layer.forward(&bottom, &mut top),
            Err(LayerError::NotReshaped)
        ));
        assert!(matches!(
            layer.backward(&top, true, &mut bottom),
            Err(LayerError::NotReshaped)
        ));
    }
}
