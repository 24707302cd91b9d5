//! # Kernels
//!
//! Numeric kernels behind the layers and the functional API.
//!
//! ## Submodules
//!
//! - [`cpu`]: reference CPU implementations (multi-threaded with `rayon`)
//!
//! ## Notes
//!
//! - Kernels work on flat row-major slices; shape checks live in the layers
//! - Forward kernels fill whatever state backward needs; backward kernels
//!   take that state explicitly
//! - Any accelerated implementation must agree with these within
//!   floating point tolerance

pub mod cpu;
