//! Tensor shapes and broadcasting rules.
//!
//! Broadcasting right-aligns two shapes, conceptually left-padding the shorter
//! one with size-1 dimensions. Each aligned pair must be equal or contain a 1;
//! the result takes the larger size of every pair.
//!
//! ```
//! use adtensors::Shape;
//!
//! let s = Shape::broadcast(&Shape::from([1, 3]), &Shape::from([3, 1])).unwrap();
//! assert_eq!(s, Shape::from([3, 3]));
//! ```

use crate::error::TensorError;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Index;

/// Ordered, immutable sequence of dimension sizes. Rank 0 is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(SmallVec<[usize; 4]>);

impl Shape {
    /// Shape of a scalar (rank 0).
    pub fn scalar() -> Self {
        Shape(SmallVec::new())
    }

    /// Dimension sizes.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (1 for a scalar).
    #[inline]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Broadcast two shapes against each other.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if some aligned pair of
    /// dimensions differs and neither of them is 1.
    pub fn broadcast(lhs: &Shape, rhs: &Shape) -> Result<Shape, TensorError> {
        let rank = lhs.rank().max(rhs.rank());
        let mut dims = SmallVec::with_capacity(rank);
        for i in 0..rank {
            let l = lhs.aligned_dim(i, rank);
            let r = rhs.aligned_dim(i, rank);
            let d = match (l, r) {
                (l, r) if l == r => l,
                (1, r) => r,
                (l, 1) => l,
                _ => return Err(TensorError::shape_mismatch("broadcast", lhs, rhs)),
            };
            dims.push(d);
        }
        Ok(Shape(dims))
    }

    /// Whether `self` can be virtually replicated to exactly `target`.
    pub fn broadcasts_to(&self, target: &Shape) -> bool {
        self.rank() <= target.rank()
            && Shape::broadcast(self, target).is_ok_and(|s| &s == target)
    }

    /// Size of dimension `i` of a right-aligned view with `rank` dimensions.
    #[inline]
    fn aligned_dim(&self, i: usize, rank: usize) -> usize {
        let pad = rank - self.rank();
        if i < pad { 1 } else { self.0[i - pad] }
    }

    /// Shape with `axis` removed.
    pub(crate) fn without_axis(&self, axis: usize) -> Shape {
        let mut dims = self.0.clone();
        dims.remove(axis);
        Shape(dims)
    }

    /// Shape with a size-1 dimension inserted at `axis`.
    pub(crate) fn with_unit_axis(&self, axis: usize) -> Shape {
        let mut dims = self.0.clone();
        dims.insert(axis, 1);
        Shape(dims)
    }

    pub(crate) fn reversed(&self) -> Shape {
        Shape(self.0.iter().rev().copied().collect())
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape(SmallVec::from_slice(dims))
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.into_iter().collect())
    }
}

impl<const N: usize> From<&[usize; N]> for Shape {
    fn from(dims: &[usize; N]) -> Self {
        Shape(SmallVec::from_slice(dims))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(SmallVec::from_vec(dims))
    }
}

impl From<&Shape> for Shape {
    fn from(shape: &Shape) -> Self {
        shape.clone()
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}
