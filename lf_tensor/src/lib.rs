//! # lf_tensor - Tensor Contract for Loss Functions
//!
//! This crate defines the dense tensor contract the loss catalog is written
//! against, with pluggable compute backends.
//!
//! ## Overview
//!
//! The core abstractions are:
//! - [`Shape`] - Row-major tensor shape
//! - [`Element`] - Scalar type (`f32` or `f64`)
//! - [`TensorData`] - Trait for tensor storage
//! - [`Backend`] - Trait for compute backends implementing tensor operations
//! - [`Tensor`] - Owned value handle exposing the backend as methods
//! - [`Error`] - Shape, domain and configuration failures
//!
//! ## Example
//!
//! ```ignore
//! use lf_tensor::prelude::*;
//! use lf_backend_cpu::CpuBackend;
//!
//! type T = Tensor<CpuBackend<f64>>;
//!
//! let x = T::from_vec(vec![1.0, 2.0, 3.0], [3])?;
//! let y = T::from_vec(vec![4.0, 5.0, 6.0], [3])?;
//!
//! let z = x.mul(&y)?.add(&x.exp())?;
//! let total = z.sum();
//! ```

pub mod backend;
pub mod data;
pub mod element;
pub mod error;
pub mod scalar;
pub mod shape;
pub mod tensor;

pub use backend::Backend;
pub use data::TensorData;
pub use element::Element;
pub use error::{Error, Result};
pub use shape::Shape;
pub use tensor::Tensor;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::data::TensorData;
    pub use crate::element::Element;
    pub use crate::error::{Error, Result};
    pub use crate::shape::Shape;
    pub use crate::tensor::Tensor;
    pub use num_traits::{Float, One, Zero};
}
