//! Core tensor data structures.
//!
//! # Tensors and Blobs
//!
//! A [`Tensor`] is a dense, row-major n-dimensional array. Layers exchange
//! [`Blob`]s: a tensor paired with a gradient buffer of identical shape,
//! expressed as [`WithGrad`].
//!
//! ## Design Highlights
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - `count` is the product of all dimensions; a rank-0 tensor holds one value
//! - Negative axis indices count from the end (`-1` is the last dimension)
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//!
//! ## Example
//!
//! ```rust
//! use style_layers::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.count(), 6);
//! assert_eq!(t.shape_at(-1), Some(3));
//! ```

use crate::float::Float;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of elements (product of all dimensions).
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Size of an axis, where negative indices count from the end.
    ///
    /// Returns `None` when the index is out of range.
    pub fn shape_at(&self, axis: isize) -> Option<usize> {
        let idx = if axis < 0 {
            self.shape.len().checked_sub(axis.unsigned_abs())?
        } else {
            axis.unsigned_abs()
        };
        self.shape.get(idx).copied()
    }

    /// Product of the dimensions in `[start, end)`.
    ///
    /// An empty range yields 1.
    pub fn count_range(&self, start: usize, end: usize) -> usize {
        count_range(&self.shape, start, end)
    }
}

impl<T: Float> Tensor<T> {
    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![T::ZERO; len],
        }
    }

    /// Resizes to `shape`, zero-filling all data when the shape changes.
    ///
    /// Returns `true` if the tensor was reallocated.
    pub fn reshape(&mut self, shape: &[usize]) -> bool {
        if self.shape == shape {
            return false;
        }
        *self = Self::zeros(shape);
        true
    }

    /// Sets every element to zero.
    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = T::ZERO);
    }
}

/// Product of `shape[start..end]`, clamped to the shape length.
pub(crate) fn count_range(shape: &[usize], start: usize, end: usize) -> usize {
    let end = end.min(shape.len());
    if start >= end {
        return 1;
    }
    shape[start..end].iter().product()
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Tensor<f32>>` or `WithGrad<f64>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

/// A tensor with a gradient buffer of the same shape.
pub type Blob<T> = WithGrad<Tensor<T>>;

impl<T: Float> WithGrad<Tensor<T>> {
    /// Wraps a tensor with a zero-initialized gradient.
    pub fn new(value: Tensor<T>) -> Self {
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }

    /// Creates a blob whose value and gradient are both zero.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let value = Tensor::zeros(shape);
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }

    /// Shape shared by the value and gradient.
    pub fn shape(&self) -> &[usize] {
        &self.value.shape
    }

    /// Resizes both buffers to `shape`.
    ///
    /// Nothing is touched when the shape is unchanged; otherwise both buffers
    /// are reallocated and zero-filled.
    pub fn reshape(&mut self, shape: &[usize]) {
        self.value.reshape(shape);
        self.grad.reshape(shape);
    }

    /// Zeroes the gradient buffer.
    pub fn zero_grad(&mut self) {
        self.grad.fill_zero();
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use style_layers::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
