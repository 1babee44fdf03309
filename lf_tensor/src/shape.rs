//! Shape utilities for tensors.

use std::fmt;

/// A tensor shape (dimensions), row-major.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// Create a scalar shape (0-dimensional).
    pub fn scalar() -> Self {
        Shape(vec![])
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Get dimension at index.
    pub fn dim(&self, idx: usize) -> usize {
        self.0[idx]
    }

    /// Get dimensions as slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Check if this is a scalar (0-dim tensor).
    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Size of the leading axis (1 for scalars).
    pub fn rows(&self) -> usize {
        self.0.first().copied().unwrap_or(1)
    }

    /// Product of all trailing axes, i.e. the length of one leading-axis row.
    pub fn cols(&self) -> usize {
        self.0.iter().skip(1).product::<usize>()
    }

    /// Size of the last axis (1 for scalars).
    pub fn last_dim(&self) -> usize {
        self.0.last().copied().unwrap_or(1)
    }

    /// Same trailing axes with a different leading dimension.
    pub fn with_leading(&self, rows: usize) -> Shape {
        let mut dims = self.0.clone();
        match dims.first_mut() {
            Some(first) => *first = rows,
            None => dims.push(rows),
        }
        Shape(dims)
    }

    /// Check if two shapes are broadcast-compatible.
    /// Returns the broadcast result shape if compatible.
    pub fn broadcast_with(&self, other: &Shape) -> Option<Shape> {
        let ndim = self.ndim().max(other.ndim());
        let mut result = vec![0usize; ndim];

        for (i, slot) in result.iter_mut().enumerate() {
            let d1 = if i < ndim - self.ndim() {
                1
            } else {
                self.0[i - (ndim - self.ndim())]
            };
            let d2 = if i < ndim - other.ndim() {
                1
            } else {
                other.0[i - (ndim - other.ndim())]
            };

            *slot = if d1 == d2 || d2 == 1 {
                d1
            } else if d1 == 1 {
                d2
            } else {
                return None;
            };
        }

        Some(Shape(result))
    }

    /// Row-major strides for this shape.
    pub fn contiguous_strides(&self) -> Vec<usize> {
        let ndim = self.0.len();
        let mut strides = vec![1usize; ndim];
        for i in (0..ndim.saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        strides
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.dim(1), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.cols(), 12);
        assert_eq!(s.last_dim(), 4);
        assert!(!s.is_scalar());
    }

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
        assert_eq!(s.rows(), 1);
        assert_eq!(s.cols(), 1);
        assert!(s.is_scalar());
    }

    #[test]
    fn test_with_leading() {
        let s = Shape::from([3, 4]);
        assert_eq!(s.with_leading(6), Shape::from([6, 4]));
        assert_eq!(Shape::scalar().with_leading(2), Shape::from([2]));
    }

    #[test]
    fn test_contiguous_strides() {
        assert_eq!(Shape::from([2, 3, 4]).contiguous_strides(), vec![12, 4, 1]);
        assert!(Shape::scalar().contiguous_strides().is_empty());
    }

    #[test]
    fn test_broadcast() {
        let a = Shape::new(vec![2, 3]);
        assert_eq!(a.broadcast_with(&a), Some(a.clone()));
        assert_eq!(a.broadcast_with(&Shape::scalar()), Some(a.clone()));
        assert_eq!(
            Shape::from([1, 4]).broadcast_with(&Shape::from([3, 1])),
            Some(Shape::from([3, 4]))
        );
        assert_eq!(a.broadcast_with(&Shape::from([2, 4])), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([3]).to_string(), "(3,)");
        assert_eq!(Shape::from([2, 3]).to_string(), "(2, 3)");
    }
}
