use log::{debug, trace};

use crate::config::{GramParameter, LayerParameter};
use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::ops::cpu::{GramDims, gram_backward, gram_forward};
use crate::tensors::Blob;

use super::{Layer, ShapePair};

/// Computes one Gram matrix per group of the input.
///
/// With `axis = a`, dimensions `a..` are flattened into feature vectors of
/// length `K`, dimension `a-1` supplies the `N` rows, and dimensions `..a-1`
/// enumerate `M` independent groups. The output has shape
/// `shape[..a] ++ [N]`, holding each group's `N×N` product `A·Aᵀ`.
///
/// # Example
/// ```rust
/// use style_layers::layers::{GramLayer, Layer};
/// use style_layers::tensors::Blob;
///
/// let mut layer = GramLayer::with_axis(2).unwrap();
/// let bottom = Blob::<f32>::zeros(vec![2, 3, 4, 5]);
/// let mut top = Blob::zeros(vec![0]);
/// layer.setup(&bottom, &mut top).unwrap();
/// assert_eq!(top.shape(), &[2, 3, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct GramLayer {
    param: GramParameter,
    dims: Option<GramDims>,
    shapes: ShapePair,
}

impl GramLayer {
    /// Builds the layer from a validated `gram_param` block.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] for `axis == 0`.
    pub fn new(param: &LayerParameter) -> Result<Self> {
        Ok(Self {
            param: param.trusted_gram()?,
            dims: None,
            shapes: ShapePair::default(),
        })
    }

    /// Shorthand for a layer over `axis`.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] for `axis == 0`.
    pub fn with_axis(axis: i32) -> Result<Self> {
        Self::new(&LayerParameter::gram(axis))
    }

    /// Configured (possibly negative) axis.
    pub const fn axis(&self) -> i32 {
        self.param.axis
    }

    /// Group layout derived at the last reshape.
    pub const fn dims(&self) -> Option<GramDims> {
        self.dims
    }

    fn ready(&self) -> Result<GramDims> {
        self.dims.ok_or(LayerError::NotReshaped)
    }
}

impl<T: Float> Layer<T> for GramLayer {
    fn layer_type(&self) -> &'static str {
        "Gram"
    }

    fn reshape(&mut self, bottom_shape: &[usize]) -> Result<Vec<usize>> {
        let (dims, axis) = GramDims::resolve(bottom_shape, self.param.axis)?;
        let top = dims.output_shape(bottom_shape, axis);
        debug!(
            "gram reshape: bottom {:?} axis {} -> M={} N={} K={}, top {:?}",
            bottom_shape, axis, dims.groups, dims.rows, dims.features, top
        );
        self.dims = Some(dims);
        self.shapes = ShapePair {
            bottom: bottom_shape.to_vec(),
            top: top.clone(),
        };
        Ok(top)
    }

    fn forward(&mut self, bottom: &Blob<T>, top: &mut Blob<T>) -> Result<()> {
        let dims = self.ready()?;
        self.shapes.check(bottom, top)?;
        trace!("gram forward: {} groups", dims.groups);
        gram_forward(dims, &bottom.value.data, &mut top.value.data);
        Ok(())
    }

    fn backward(
        &mut self,
        top: &Blob<T>,
        propagate_down: bool,
        bottom: &mut Blob<T>,
    ) -> Result<()> {
        if !propagate_down {
            trace!("gram backward skipped: propagation disabled");
            return Ok(());
        }
        let dims = self.ready()?;
        self.shapes.check(bottom, top)?;
        trace!("gram backward: {} groups", dims.groups);
        gram_backward(dims, &top.grad.data, &bottom.value.data, &mut bottom.grad.data);
        Ok(())
    }
}
