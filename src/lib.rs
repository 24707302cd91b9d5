//! # `style_layers`
//!
//! Two differentiable layers used in neural style transfer and feature
//! inversion, written for both `f32` and `f64`:
//!
//! - **Gram**: one `A·Aᵀ` feature-correlation matrix per group of an input
//!   tensor, with an exact backward pass
//! - **TV loss**: a total-variation smoothness penalty
//!   `Σ (dx² + dy²)^(beta/2)` over the two trailing (spatial) axes
//!
//! ## Features
//!
//! - **Tensors**: shaped row-major buffers paired with gradients ([`tensors::Blob`])
//! - **Layers**: stateful reshape / forward / backward objects ([`layers::Layer`])
//! - **Autograd**: functional forward passes returning backward closures ([`backprop`])
//! - **Registry**: layers instantiated by type name from JSON descriptions ([`registry`])
//! - **Gradient checking**: central-difference verification of any layer ([`gradcheck`])
//!
//! Kernels run on the CPU; matrix products are split across rows with Rayon.
//!
//! ## Example
//!
//! ```rust
//! use style_layers::config::LayerParameter;
//! use style_layers::registry::create_layer;
//! use style_layers::tensors::Blob;
//!
//! let param = LayerParameter::from_json(r#"{ "type": "Gram" }"#).unwrap();
//! let mut gram = create_layer::<f32>(&param).unwrap();
//!
//! let bottom = Blob::zeros(vec![2, 3, 4, 5]);
//! let mut top = Blob::zeros(vec![0]);
//! gram.setup(&bottom, &mut top).unwrap();
//! gram.forward(&bottom, &mut top).unwrap();
//! assert_eq!(top.shape(), &[2, 3, 3]);
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::type_complexity,
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::similar_names,
    clippy::module_name_repetitions
)]
#![deny(unsafe_code)]
#![forbid(unused_must_use)]

pub mod backprop;
pub mod config;
pub mod error;
pub mod float;
pub mod gradcheck;
pub mod layers;
pub mod ops;
pub mod registry;
pub mod tensors;

pub use error::{LayerError, Result};
pub use float::Float;
pub use layers::{GramLayer, Layer, TvLossLayer};
pub use tensors::{Blob, Tensor, WithGrad};
