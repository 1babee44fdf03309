//! TensorData trait - the core abstraction for tensor storage.

use crate::element::Element;
use crate::shape::Shape;

/// Core trait for tensor data storage.
/// Backends implement this to provide the actual tensor memory.
pub trait TensorData: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Scalar type of the stored elements.
    type Elem: Element;

    /// Get the shape of this tensor.
    fn shape(&self) -> &Shape;

    /// Get the total number of elements.
    fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Get data as a contiguous row-major slice.
    fn as_slice(&self) -> &[Self::Elem];

    /// Get mutable data as a contiguous row-major slice.
    fn as_slice_mut(&mut self) -> &mut [Self::Elem];
}
