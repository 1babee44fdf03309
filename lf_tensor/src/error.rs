//! Error type shared by the tensor contract and the loss catalog.

use thiserror::Error;

use crate::shape::Shape;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised synchronously by tensor operations and loss functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Two tensors (or two halves of a paired input) cannot be combined.
    #[error("{op}: shape mismatch, expected {expected} but got {got}")]
    ShapeMismatch {
        op: &'static str,
        expected: Shape,
        got: Shape,
    },

    /// An input value lies outside the mathematical domain of the operation.
    #[error("{op}: domain violation: {reason}")]
    DomainViolation { op: &'static str, reason: String },

    /// A loss was configured with an invalid parameter.
    #[error("{op}: invalid configuration: {reason}")]
    InvalidConfiguration { op: &'static str, reason: String },
}

impl Error {
    pub fn shape_mismatch(op: &'static str, expected: &Shape, got: &Shape) -> Self {
        Error::ShapeMismatch {
            op,
            expected: expected.clone(),
            got: got.clone(),
        }
    }

    pub fn domain(op: &'static str, reason: impl Into<String>) -> Self {
        Error::DomainViolation {
            op,
            reason: reason.into(),
        }
    }

    pub fn config(op: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            op,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shape_mismatch() {
        let err = Error::shape_mismatch("mse", &Shape::new(vec![2, 3]), &Shape::new(vec![3]));
        assert_eq!(
            err.to_string(),
            "mse: shape mismatch, expected (2, 3) but got (3,)"
        );
    }

    #[test]
    fn test_display_config() {
        let err = Error::config("huber", "delta must be positive, got -1");
        assert_eq!(
            err.to_string(),
            "huber: invalid configuration: delta must be positive, got -1"
        );
    }
}
