//! Layer registry.
//!
//! Maps a type name (`"Gram"`, `"TVLoss"`) to a constructor. Two kinds of
//! registry exist:
//!
//! - owned [`LayerRegistry`] values, which callers can extend with their own
//!   creators before handing them out read-only
//! - one process-wide registry per precision, built on first use with the
//!   built-in layers and never modified afterwards; [`create_layer`] reads it
//!
//! # Example
//! ```rust
//! use style_layers::config::LayerParameter;
//! use style_layers::registry::create_layer;
//!
//! let layer = create_layer::<f32>(&LayerParameter::tv_loss(2.5)).unwrap();
//! assert_eq!(layer.layer_type(), "TVLoss");
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;

use crate::config::LayerParameter;
use crate::error::{LayerError, Result};
use crate::float::Float;
use crate::layers::{GramLayer, Layer, TvLossLayer};

/// Constructor stored in a registry.
pub type LayerCreator<T> = fn(&LayerParameter) -> Result<Box<dyn Layer<T>>>;

/// A name → constructor table for one precision.
pub struct LayerRegistry<T> {
    creators: HashMap<String, LayerCreator<T>>,
}

impl<T: Float> LayerRegistry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            creators: HashMap::new(),
        }
    }

    /// A registry holding `"Gram"` and `"TVLoss"`.
    pub fn with_builtin_layers() -> Self {
        let mut registry = Self::new();
        registry.creators.insert("Gram".into(), create_gram::<T>);
        registry.creators.insert("TVLoss".into(), create_tv_loss::<T>);
        registry
    }

    /// Registers `creator` under `layer_type`.
    ///
    /// # Errors
    /// Returns [`LayerError::DuplicateLayerType`] if the name is taken.
    pub fn add_creator(&mut self, layer_type: &str, creator: LayerCreator<T>) -> Result<()> {
        if self.creators.contains_key(layer_type) {
            return Err(LayerError::DuplicateLayerType(layer_type.to_owned()));
        }
        debug!("registering layer type {layer_type}");
        self.creators.insert(layer_type.to_owned(), creator);
        Ok(())
    }

    /// Instantiates the layer named by `param.layer_type`.
    ///
    /// # Errors
    /// Returns [`LayerError::UnknownLayerType`] for unregistered names, or
    /// whatever the creator rejects.
    pub fn create_layer(&self, param: &LayerParameter) -> Result<Box<dyn Layer<T>>> {
        let creator = self
            .creators
            .get(&param.layer_type)
            .ok_or_else(|| LayerError::UnknownLayerType(param.layer_type.clone()))?;
        debug!("creating layer {:?} of type {}", param.name, param.layer_type);
        creator(param)
    }

    /// Whether `layer_type` is registered.
    pub fn contains(&self, layer_type: &str) -> bool {
        self.creators.contains_key(layer_type)
    }

    /// Registered type names, sorted.
    pub fn layer_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.creators.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: Float> Default for LayerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn create_gram<T: Float>(param: &LayerParameter) -> Result<Box<dyn Layer<T>>> {
    Ok(Box::new(GramLayer::new(param)?))
}

fn create_tv_loss<T: Float>(param: &LayerParameter) -> Result<Box<dyn Layer<T>>> {
    Ok(Box::new(TvLossLayer::<T>::new(param)?))
}

lazy_static! {
    static ref F32_REGISTRY: LayerRegistry<f32> = LayerRegistry::with_builtin_layers();
    static ref F64_REGISTRY: LayerRegistry<f64> = LayerRegistry::with_builtin_layers();
}

/// Precisions with a process-wide registry.
pub trait GlobalRegistry: Float {
    /// The shared, read-only registry for this precision.
    fn registry() -> &'static LayerRegistry<Self>;
}

impl GlobalRegistry for f32 {
    fn registry() -> &'static LayerRegistry<Self> {
        &F32_REGISTRY
    }
}

impl GlobalRegistry for f64 {
    fn registry() -> &'static LayerRegistry<Self> {
        &F64_REGISTRY
    }
}

/// Instantiates a layer from the process-wide registry.
///
/// # Errors
/// See [`LayerRegistry::create_layer`].
pub fn create_layer<T: GlobalRegistry>(param: &LayerParameter) -> Result<Box<dyn Layer<T>>> {
    T::registry().create_layer(param)
}
