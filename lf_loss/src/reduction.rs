//! Reduction modes shared by the loss catalog.

use lf_tensor::prelude::*;
use serde::{Deserialize, Serialize};

/// How a per-element loss collapses into a scalar.
///
/// Mean divides both the scalar and the gradient by the same element count.
/// The unreduced ("none") form is available through
/// [`PointwiseLoss::unreduced`](crate::PointwiseLoss::unreduced).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Sum over all elements.
    Sum,
    /// Sum divided by the element count.
    #[default]
    Mean,
}

impl Reduction {
    /// Collapse an already-summed loss over `count` elements.
    pub fn reduce<T: Element>(self, sum: T, count: usize) -> T {
        match self {
            Reduction::Sum => sum,
            Reduction::Mean if count == 0 => T::zero(),
            Reduction::Mean => sum / T::constant(count as f64),
        }
    }

    /// Apply the matching scaling to a gradient computed for [`Reduction::Sum`].
    pub fn scale_gradient<B: Backend>(self, grad: Tensor<B>, count: usize) -> Tensor<B> {
        match self {
            Reduction::Sum => grad,
            Reduction::Mean if count == 0 => grad,
            Reduction::Mean => grad.scale(B::Elem::constant(1.0 / count as f64)),
        }
    }

    /// `Mean` when `take_mean` is set, `Sum` otherwise.
    pub fn from_take_mean(take_mean: bool) -> Self {
        if take_mean {
            Reduction::Mean
        } else {
            Reduction::Sum
        }
    }
}
