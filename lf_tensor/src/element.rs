//! Element trait - the scalar type stored in a tensor.

use std::fmt::{Debug, Display};
use std::iter::Sum;

use num_traits::Float;

/// Scalar element of a tensor.
///
/// Loss formulas are written once against this trait and run unchanged on
/// `f32` and `f64` backends.
pub trait Element: Float + Default + Debug + Display + Sum + Send + Sync + 'static {
    /// Build an element from a literal coefficient.
    fn constant(value: f64) -> Self;

    /// Widen to `f64` (used for logging and numerical checks).
    fn to_f64_lossy(self) -> f64;
}

impl Element for f32 {
    #[inline]
    fn constant(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64_lossy(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64_lossy(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half<T: Element>() -> T {
        T::constant(0.5)
    }

    #[test]
    fn test_constant_roundtrip() {
        assert_eq!(half::<f32>(), 0.5f32);
        assert_eq!(half::<f64>(), 0.5f64);
        assert_eq!(2.5f32.to_f64_lossy(), 2.5);
    }
}
