//! Owned tensor value handle.

use crate::backend::Backend;
use crate::data::TensorData;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::shape::Shape;

/// A dense tensor owned by the caller, backed by `B::Tensor`.
///
/// Every operation allocates a fresh result; nothing is retained between
/// calls.
pub struct Tensor<B: Backend>(B::Tensor);

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor(self.0.clone())
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", self.shape())
            .field("data", &self.as_slice())
            .finish()
    }
}

impl<B: Backend> Tensor<B> {
    // === Constructors ===

    /// Wrap backend storage.
    pub fn from_data(data: B::Tensor) -> Self {
        Tensor(data)
    }

    /// Create a tensor from row-major data.
    pub fn from_vec(data: Vec<B::Elem>, shape: impl Into<Shape>) -> Result<Self> {
        B::from_vec(data, shape.into()).map(Tensor)
    }

    /// Create a zeros tensor.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Tensor(B::zeros(&shape.into()))
    }

    /// Create a ones tensor.
    pub fn ones(shape: impl Into<Shape>) -> Self {
        Self::full(shape, B::Elem::constant(1.0))
    }

    /// Create a tensor filled with `value`.
    pub fn full(shape: impl Into<Shape>, value: B::Elem) -> Self {
        Tensor(B::full(&shape.into(), value))
    }

    // === Accessors ===

    /// Get the backend storage.
    pub fn data(&self) -> &B::Tensor {
        &self.0
    }

    /// Unwrap into backend storage.
    pub fn into_data(self) -> B::Tensor {
        self.0
    }

    /// Get the shape.
    pub fn shape(&self) -> &Shape {
        self.0.shape()
    }

    /// Get number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    /// Get number of elements.
    pub fn numel(&self) -> usize {
        self.0.numel()
    }

    /// Size of the leading axis.
    pub fn rows(&self) -> usize {
        self.shape().rows()
    }

    /// Length of one leading-axis row.
    pub fn cols(&self) -> usize {
        self.shape().cols()
    }

    /// Get data as slice (for reading values).
    pub fn as_slice(&self) -> &[B::Elem] {
        self.0.as_slice()
    }

    /// Fail with `ShapeMismatch` unless `other` has exactly this shape.
    pub fn expect_shape(&self, op: &'static str, other: &Tensor<B>) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(Error::shape_mismatch(op, self.shape(), other.shape()))
        }
    }

    // === Unary operations ===

    pub fn neg(&self) -> Self {
        Tensor(B::neg(&self.0))
    }

    pub fn abs(&self) -> Self {
        Tensor(B::abs(&self.0))
    }

    pub fn signum(&self) -> Self {
        Tensor(B::signum(&self.0))
    }

    pub fn exp(&self) -> Self {
        Tensor(B::exp(&self.0))
    }

    pub fn log(&self) -> Self {
        Tensor(B::log(&self.0))
    }

    pub fn ln_1p(&self) -> Self {
        Tensor(B::ln_1p(&self.0))
    }

    pub fn cosh(&self) -> Self {
        Tensor(B::cosh(&self.0))
    }

    pub fn tanh(&self) -> Self {
        Tensor(B::tanh(&self.0))
    }

    pub fn sigmoid(&self) -> Self {
        Tensor(B::sigmoid(&self.0))
    }

    pub fn sqrt(&self) -> Self {
        Tensor(B::sqrt(&self.0))
    }

    pub fn square(&self) -> Self {
        Tensor(B::square(&self.0))
    }

    /// Apply `f` to every element.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(B::Elem) -> B::Elem,
    {
        Tensor(B::map(&self.0, f))
    }

    // === Binary operations ===

    pub fn add(&self, other: &Self) -> Result<Self> {
        B::add(&self.0, &other.0).map(Tensor)
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        B::sub(&self.0, &other.0).map(Tensor)
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        B::mul(&self.0, &other.0).map(Tensor)
    }

    pub fn div(&self, other: &Self) -> Result<Self> {
        B::div(&self.0, &other.0).map(Tensor)
    }

    pub fn maximum(&self, other: &Self) -> Result<Self> {
        B::maximum(&self.0, &other.0).map(Tensor)
    }

    /// Combine with `other` element by element.
    pub fn zip_map<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(B::Elem, B::Elem) -> B::Elem,
    {
        B::zip_map(&self.0, &other.0, f).map(Tensor)
    }

    // === Scalar operations ===

    pub fn scale(&self, factor: B::Elem) -> Self {
        Tensor(B::scale(&self.0, factor))
    }

    pub fn add_scalar(&self, value: B::Elem) -> Self {
        Tensor(B::add_scalar(&self.0, value))
    }

    // === Reductions ===

    pub fn sum(&self) -> B::Elem {
        B::sum(&self.0)
    }

    pub fn mean(&self) -> B::Elem {
        B::mean(&self.0)
    }

    pub fn dot(&self, other: &Self) -> Result<B::Elem> {
        B::dot(&self.0, &other.0)
    }

    // === Shape operations ===

    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        B::reshape(&self.0, &shape.into()).map(Tensor)
    }

    /// Split along the leading axis at row `at`.
    pub fn split_rows(&self, at: usize) -> Result<(Self, Self)> {
        let (head, tail) = B::split_rows(&self.0, at)?;
        Ok((Tensor(head), Tensor(tail)))
    }

    /// Concatenate tensors along the leading axis.
    pub fn concat_rows(parts: &[&Self]) -> Result<Self> {
        let raw: Vec<&B::Tensor> = parts.iter().map(|t| &t.0).collect();
        B::concat_rows(&raw).map(Tensor)
    }

    /// Accumulate `other` into this tensor in place.
    pub fn accumulate(&mut self, other: &Self) -> Result<()> {
        B::accumulate(&mut self.0, &other.0)
    }
}
