//! Backend trait - the tensor contract consumed by the loss catalog.

use crate::data::TensorData;
use crate::element::Element;
use crate::error::Result;
use crate::shape::Shape;

/// Backend trait for tensor computation.
///
/// Element-wise binary operations broadcast their operands and fail with
/// `ShapeMismatch` when the shapes are incompatible. Shape operations work on
/// the leading axis, which is where paired and composite losses stack their
/// segments.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Scalar element type.
    type Elem: Element;

    /// The tensor storage type for this backend.
    type Tensor: TensorData<Elem = Self::Elem>;

    // === Creation ===

    /// Create a tensor of zeros with the given shape.
    fn zeros(shape: &Shape) -> Self::Tensor;

    /// Create a tensor filled with a constant value.
    fn full(shape: &Shape, value: Self::Elem) -> Self::Tensor;

    /// Create a tensor from a flat row-major data vector and shape.
    fn from_vec(data: Vec<Self::Elem>, shape: Shape) -> Result<Self::Tensor>;

    // === Element-wise unary operations ===

    /// Negate: -x
    fn neg(x: &Self::Tensor) -> Self::Tensor;

    /// Absolute value: |x|
    fn abs(x: &Self::Tensor) -> Self::Tensor;

    /// Sign: -1, 0 or 1.
    fn signum(x: &Self::Tensor) -> Self::Tensor;

    /// Exponential: e^x
    fn exp(x: &Self::Tensor) -> Self::Tensor;

    /// Natural logarithm: ln(x)
    fn log(x: &Self::Tensor) -> Self::Tensor;

    /// ln(1 + x), accurate for small x.
    fn ln_1p(x: &Self::Tensor) -> Self::Tensor;

    /// Hyperbolic cosine.
    fn cosh(x: &Self::Tensor) -> Self::Tensor;

    /// Hyperbolic tangent.
    fn tanh(x: &Self::Tensor) -> Self::Tensor;

    /// Logistic sigmoid, evaluated without overflow for large |x|.
    fn sigmoid(x: &Self::Tensor) -> Self::Tensor;

    /// Square root.
    fn sqrt(x: &Self::Tensor) -> Self::Tensor;

    /// Square: x * x
    fn square(x: &Self::Tensor) -> Self::Tensor;

    /// Apply an arbitrary element-wise function.
    fn map<F>(x: &Self::Tensor, f: F) -> Self::Tensor
    where
        F: Fn(Self::Elem) -> Self::Elem;

    // === Element-wise binary operations ===

    /// Addition: a + b
    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Subtraction: a - b
    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Multiplication: a * b
    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Division: a / b
    fn div(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Maximum: max(a, b) element-wise
    fn maximum(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Tensor>;

    /// Combine two tensors with an arbitrary element-wise function.
    fn zip_map<F>(a: &Self::Tensor, b: &Self::Tensor, f: F) -> Result<Self::Tensor>
    where
        F: Fn(Self::Elem, Self::Elem) -> Self::Elem;

    // === Scalar operations ===

    /// Multiply every element by a scalar.
    fn scale(x: &Self::Tensor, factor: Self::Elem) -> Self::Tensor;

    /// Add a scalar to every element.
    fn add_scalar(x: &Self::Tensor, value: Self::Elem) -> Self::Tensor;

    // === Reductions ===

    /// Sum over all elements.
    fn sum(x: &Self::Tensor) -> Self::Elem;

    /// Mean over all elements.
    fn mean(x: &Self::Tensor) -> Self::Elem;

    /// Inner product of two same-shaped tensors.
    fn dot(a: &Self::Tensor, b: &Self::Tensor) -> Result<Self::Elem>;

    // === Shape operations ===

    /// Reshape to new shape (must have same numel).
    fn reshape(x: &Self::Tensor, shape: &Shape) -> Result<Self::Tensor>;

    /// Split along the leading axis into rows `[0, at)` and `[at, rows)`.
    fn split_rows(x: &Self::Tensor, at: usize) -> Result<(Self::Tensor, Self::Tensor)>;

    /// Concatenate along the leading axis.
    fn concat_rows(parts: &[&Self::Tensor]) -> Result<Self::Tensor>;

    // === Accumulation ===

    /// Accumulate in place: dst += src
    fn accumulate(dst: &mut Self::Tensor, src: &Self::Tensor) -> Result<()>;
}
