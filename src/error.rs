//! Error types shared by the layers, the registry and the configuration loader.
//!
//! Every failure here is a configuration or programming error: the numeric
//! transforms are deterministic, so nothing is retried.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = LayerError> = core::result::Result<T, E>;

/// Errors raised while configuring, reshaping or running a layer.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Axis index outside `[-rank, rank)`.
    #[error("axis {axis} out of range for a tensor of rank {rank}")]
    InvalidAxis { axis: i32, rank: usize },

    /// The Gram axis resolved to 0, leaving no group dimension before it.
    #[error("gram axis must resolve to at least 1, got {axis}")]
    AxisBeforeFirst { axis: i32 },

    /// Input has fewer axes than the layer needs.
    #[error("input of rank {rank} is below the required minimum of {min}")]
    RankTooLow { rank: usize, min: usize },

    /// TV loss needs at least a 2×2 spatial grid.
    #[error("spatial dims {height}x{width} too small, both must be at least 2")]
    SpatialTooSmall { height: usize, width: usize },

    /// A blob does not match the shape established at reshape time.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Forward or backward called before any reshape.
    #[error("layer used before reshape")]
    NotReshaped,

    /// Backward called without a preceding forward on the current input.
    #[error("backward requires a preceding forward pass")]
    BackwardBeforeForward,

    /// A layer parameter failed validation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No creator registered under this type name.
    #[error("unknown layer type: {0}")]
    UnknownLayerType(String),

    /// A creator is already registered under this type name.
    #[error("layer type {0} already registered")]
    DuplicateLayerType(String),

    /// The layer description could not be parsed.
    #[error("failed to parse layer parameter: {0}")]
    Config(#[from] serde_json::Error),
}
