//! Layer configuration.
//!
//! # Layer Parameters
//!
//! A [`LayerParameter`] names the layer type (the registry key) and carries the
//! per-layer parameter blocks. Descriptions are plain JSON:
//!
//! ```json
//! { "name": "style_gram", "type": "Gram", "gram_param": { "axis": 2 } }
//! { "name": "smoothness", "type": "TVLoss", "tv_loss_param": { "beta": 2.5 } }
//! ```
//!
//! Missing blocks and fields fall back to their defaults (`axis = 2`,
//! `beta = 2.0`). Parameter blocks are validated with `briny` before a layer
//! accepts them, so a malformed description fails at construction time rather
//! than producing wrong numbers later.

use briny::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};

/// Parameters of the Gram layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GramParameter {
    /// First axis flattened into the feature vector. The axis before it holds
    /// the rows of each Gram matrix; everything before that indexes groups.
    /// Negative values count from the end.
    pub axis: i32,
}

impl Default for GramParameter {
    fn default() -> Self {
        Self { axis: 2 }
    }
}

impl Validate for GramParameter {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        // axis 0 never has a row dimension in front of it
        if self.axis == 0 {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Parameters of the total-variation loss layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TvLossParameter {
    /// Exponent of the penalty: each pixel contributes `(dx² + dy²)^(beta/2)`.
    pub beta: f64,
}

impl Default for TvLossParameter {
    fn default() -> Self {
        Self { beta: 2.0 }
    }
}

impl Validate for TvLossParameter {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Description of a single layer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameter {
    /// Instance name, used only for diagnostics.
    #[serde(default)]
    pub name: String,
    /// Registered type name, e.g. `"Gram"` or `"TVLoss"`.
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(default)]
    pub gram_param: GramParameter,
    #[serde(default)]
    pub tv_loss_param: TvLossParameter,
}

impl LayerParameter {
    /// A parameter set for `layer_type` with every block at its default.
    pub fn new(layer_type: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            layer_type: layer_type.into(),
            gram_param: GramParameter::default(),
            tv_loss_param: TvLossParameter::default(),
        }
    }

    /// A `"Gram"` layer over the given axis.
    pub fn gram(axis: i32) -> Self {
        let mut param = Self::new("Gram");
        param.gram_param.axis = axis;
        param
    }

    /// A `"TVLoss"` layer with the given exponent.
    pub fn tv_loss(beta: f64) -> Self {
        let mut param = Self::new("TVLoss");
        param.tv_loss_param.beta = beta;
        param
    }

    /// Sets the instance name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parses a layer description from JSON.
    ///
    /// # Errors
    /// Returns [`LayerError::Config`] when the text is not a valid description.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the description back to JSON.
    ///
    /// # Errors
    /// Returns [`LayerError::Config`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The Gram block, validated.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] for `axis == 0`.
    pub fn trusted_gram(&self) -> Result<GramParameter> {
        TrustedData::new(self.gram_param)
            .map(TrustedData::into_inner)
            .map_err(|_| {
                LayerError::InvalidParameter(format!(
                    "{}: gram_param.axis must not be 0",
                    self.display_name()
                ))
            })
    }

    /// The TV loss block, validated.
    ///
    /// # Errors
    /// Returns [`LayerError::InvalidParameter`] unless `beta` is finite and positive.
    pub fn trusted_tv_loss(&self) -> Result<TvLossParameter> {
        TrustedData::new(self.tv_loss_param)
            .map(TrustedData::into_inner)
            .map_err(|_| {
                LayerError::InvalidParameter(format!(
                    "{}: tv_loss_param.beta must be finite and positive, got {}",
                    self.display_name(),
                    self.tv_loss_param.beta
                ))
            })
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.layer_type
        } else {
            &self.name
        }
    }
}
