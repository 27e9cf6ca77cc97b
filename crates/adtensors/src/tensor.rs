//! Immutable n-dimensional tensor values and views.
//!
//! A [`Tensor`] is a [`Storage`] handle plus a [`Layout`]. Every operation
//! returns a new value; nothing is updated in place. Indexing, axis views,
//! transposition and broadcasting produce views that share the base storage,
//! and the storage lives as long as the longest-living view.
//!
//! ```
//! use adtensors::Tensor;
//!
//! let x = Tensor::from_fn([2, 3, 4], |i| (i[0] * 12 + i[1] * 4 + i[2] + 1) as f64);
//! assert_eq!(x.get(&[1, 2, 3]).unwrap(), 24.0);
//! assert_eq!(x.view(&[1, 2, 3]).unwrap().item().unwrap(), 24.0);
//!
//! let t = x.transpose();
//! assert_eq!(t.shape().dims(), &[4, 3, 2]);
//! assert_eq!(t.get(&[3, 2, 1]).unwrap(), x.get(&[1, 2, 3]).unwrap());
//! assert!(t.shares_storage_with(&x));
//! ```

use crate::error::TensorError;
use crate::layout::{AxisIndex, Layout, ViewSpec, linear_to_cartesian};
use crate::shape::Shape;
use crate::storage::Storage;
use std::fmt;

/// Immutable multi-dimensional `f64` value.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Storage,
    layout: Layout,
}

impl Tensor {
    pub(crate) fn from_parts(storage: Storage, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create tensor from data and shape.
    ///
    /// Data is expected to be in row-major order.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use adtensors::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
    /// assert_eq!(t.get(&[0, 1]).unwrap(), 2.0);
    /// assert_eq!(t.get(&[1, 0]).unwrap(), 4.0);
    /// ```
    pub fn from_vec(data: Vec<f64>, shape: impl Into<Shape>) -> Result<Self, TensorError> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(TensorError::shape_mismatch(
                "from_vec",
                shape,
                [data.len()],
            ));
        }
        Ok(Self::from_parts(
            Storage::from_vec(data),
            Layout::contiguous(shape),
        ))
    }

    /// Create a zero-initialised tensor.
    ///
    /// ```
    /// use adtensors::Tensor;
    ///
    /// let t = Tensor::zeros([2, 3, 4]);
    /// assert_eq!(t.numel(), 24);
    /// ```
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Create a tensor with every element equal to `value`.
    pub fn full(shape: impl Into<Shape>, value: f64) -> Self {
        let shape = shape.into();
        Self::from_parts(
            Storage::from_vec(vec![value; shape.numel()]),
            Layout::contiguous(shape),
        )
    }

    /// Rank-0 tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::full(Shape::scalar(), value)
    }

    /// Create a tensor by evaluating `f` at every multi-index in row-major order.
    pub fn from_fn(shape: impl Into<Shape>, mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let shape = shape.into();
        let data = (0..shape.numel())
            .map(|i| f(&linear_to_cartesian(i, shape.dims())))
            .collect();
        Self::from_parts(Storage::from_vec(data), Layout::contiguous(shape))
    }

    /// Rank-1 tensor `[0, 1, ..., n - 1]`.
    pub fn arange(n: usize) -> Self {
        Self::from_parts(
            Storage::from_vec((0..n).map(|i| i as f64).collect()),
            Layout::contiguous(Shape::from([n])),
        )
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.layout.shape().rank()
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.shape().numel()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Check if this tensor shares storage with another tensor.
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        self.storage.shares_storage_with(&other.storage)
    }

    /// Whether another tensor or view holds the same storage.
    pub fn is_shared(&self) -> bool {
        self.storage.is_shared()
    }

    /// Read the element at a full multi-index.
    ///
    /// # Errors
    ///
    /// `WrongNumberOfIndices` unless exactly one index per dimension is given,
    /// `IndexOutOfRange` if any index is outside its dimension.
    pub fn get(&self, indices: &[usize]) -> Result<f64, TensorError> {
        let offset = self.layout.offset_of(indices)?;
        Ok(self.storage.as_slice()[offset])
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Result<f64, TensorError> {
        if self.numel() != 1 {
            return Err(TensorError::shape_mismatch(
                "item",
                self.shape(),
                Shape::scalar(),
            ));
        }
        Ok(self.storage.as_slice()[self.layout.offset()])
    }

    /// Index the leading axes.
    ///
    /// A full index returns a rank-0 view of that element; a partial index
    /// returns a view over the remaining trailing axes.
    pub fn view(&self, indices: &[usize]) -> Result<Tensor, TensorError> {
        self.apply_view(&ViewSpec::Index(indices.to_vec()))
    }

    /// View along one axis: a single index drops the axis, a range keeps it.
    ///
    /// ```
    /// use adtensors::{AxisIndex, Tensor};
    ///
    /// let x = Tensor::zeros([2, 3, 4]);
    /// let at = x.view_axis(1, AxisIndex::At(2)).unwrap();
    /// assert_eq!(at.shape().dims(), &[2, 4]);
    /// let range = x.view_axis(2, AxisIndex::Range(1..3)).unwrap();
    /// assert_eq!(range.shape().dims(), &[2, 3, 2]);
    /// ```
    pub fn view_axis(&self, axis: usize, index: AxisIndex) -> Result<Tensor, TensorError> {
        self.apply_view(&ViewSpec::Axis { axis, index })
    }

    /// Reverse the order of all axes: `t.transpose()[a, b, c] == t[c, b, a]`.
    pub fn transpose(&self) -> Tensor {
        Self::from_parts(self.storage.clone(), self.layout.transposed())
    }

    /// Permute the dimensions of the tensor.
    ///
    /// `perm[i]` gives the source dimension for the i-th dimension of the result.
    pub fn permute(&self, perm: &[usize]) -> Result<Tensor, TensorError> {
        self.apply_view(&ViewSpec::Permute(perm.to_vec()))
    }

    /// Virtually replicate this tensor to `shape` without copying.
    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<Tensor, TensorError> {
        self.apply_view(&ViewSpec::BroadcastTo(shape.into()))
    }

    /// Apply an arbitrary view transform.
    pub fn apply_view(&self, spec: &ViewSpec) -> Result<Tensor, TensorError> {
        Ok(Self::from_parts(
            self.storage.clone(),
            self.layout.apply(spec)?,
        ))
    }

    /// Reinterpret the elements (in row-major order) with a new shape.
    ///
    /// Shares storage when this tensor is contiguous and copies otherwise.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Tensor, TensorError> {
        let shape = shape.into();
        if shape.numel() != self.numel() {
            return Err(TensorError::shape_mismatch("reshape", self.shape(), shape));
        }
        if self.is_contiguous() {
            Ok(Self::from_parts(
                self.storage.clone(),
                self.layout.reshaped_contiguous(shape),
            ))
        } else {
            Ok(Self::from_parts(
                Storage::from_vec(self.to_vec()),
                Layout::contiguous(shape),
            ))
        }
    }

    /// A tensor with the same values in its own dense row-major buffer.
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() && self.layout.offset() == 0 && self.storage.len() == self.numel()
        {
            return self.clone();
        }
        Self::from_parts(
            Storage::from_vec(self.to_vec()),
            Layout::contiguous(self.shape().clone()),
        )
    }

    /// Elements in row-major logical order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        let data = self.storage.as_slice();
        self.layout.offsets().map(move |o| data[o])
    }

    /// Copy the elements out in row-major logical order.
    pub fn to_vec(&self) -> Vec<f64> {
        if self.is_contiguous() {
            let start = self.layout.offset();
            self.storage.as_slice()[start..start + self.numel()].to_vec()
        } else {
            self.iter().collect()
        }
    }

    /// Apply `f` to every element, returning a new dense tensor.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Self::from_parts(
            Storage::from_vec(self.iter().map(f).collect()),
            Layout::contiguous(self.shape().clone()),
        )
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl<const N: usize> std::ops::Index<[usize; N]> for Tensor {
    type Output = f64;

    /// Panics if the index is invalid; use [`Tensor::get`] to handle errors.
    fn index(&self, indices: [usize; N]) -> &f64 {
        match self.layout.offset_of(&indices) {
            Ok(offset) => &self.storage.as_slice()[offset],
            Err(e) => panic!("{e}"),
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{} {:?}", self.shape(), self.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        Tensor::from_vec((1..=n).map(|x| x as f64).collect(), shape).unwrap()
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros([2, 3]);
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.rank(), 2);
        assert_eq!(t.numel(), 6);
        assert!(t.iter().all(|x| x == 0.0));
    }

    #[test]
    fn test_from_vec_row_major() {
        let t = iota(&[2, 3]);
        assert_eq!(t.get(&[0, 0]).unwrap(), 1.0);
        assert_eq!(t.get(&[0, 2]).unwrap(), 3.0);
        assert_eq!(t.get(&[1, 0]).unwrap(), 4.0);
        assert_eq!(t[[1, 2]], 6.0);
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let result = Tensor::from_vec(vec![1.0, 2.0, 3.0], [2, 3]);
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch { op: "from_vec", .. })
        ));
    }

    #[test]
    fn test_scalar_tensor() {
        let t = Tensor::scalar(3.5);
        assert_eq!(t.rank(), 0);
        assert_eq!(t.numel(), 1);
        assert_eq!(t.get(&[]).unwrap(), 3.5);
        assert_eq!(t.item().unwrap(), 3.5);
    }

    #[test]
    fn test_get_errors() {
        let t = Tensor::zeros([2, 3]);
        assert!(matches!(
            t.get(&[2, 0]),
            Err(TensorError::IndexOutOfRange {
                index: 2,
                axis: 0,
                size: 2
            })
        ));
        assert!(matches!(
            t.get(&[0]),
            Err(TensorError::WrongNumberOfIndices { .. })
        ));
    }

    #[test]
    fn test_full_index_matches_view() {
        let x = iota(&[2, 3, 4]);
        assert_eq!(x[[1, 2, 3]], 24.0);
        let v = x.view(&[1, 2, 3]).unwrap();
        assert_eq!(v.rank(), 0);
        assert_eq!(v.item().unwrap(), 24.0);
        assert!(v.shares_storage_with(&x));
    }

    #[test]
    fn test_partial_index_view() {
        let x = iota(&[2, 3, 4]);
        let v = x.view(&[1]).unwrap();
        assert_eq!(v.shape().dims(), &[3, 4]);
        assert_eq!(v.get(&[0, 0]).unwrap(), 13.0);
        let row = x.view(&[0, 1]).unwrap();
        assert_eq!(row.to_vec(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_view_axis_index_and_range() {
        let x = iota(&[2, 3, 4]);
        let col = x.view_axis(2, AxisIndex::At(0)).unwrap();
        assert_eq!(col.shape().dims(), &[2, 3]);
        assert_eq!(col.to_vec(), vec![1.0, 5.0, 9.0, 13.0, 17.0, 21.0]);

        let mid = x.view_axis(1, AxisIndex::Range(1..3)).unwrap();
        assert_eq!(mid.shape().dims(), &[2, 2, 4]);
        assert_eq!(mid.get(&[1, 0, 0]).unwrap(), 17.0);

        let full = x.view_axis(1, AxisIndex::Range(0..3)).unwrap();
        assert_eq!(full, x);
    }

    #[test]
    fn test_transpose_reverses_indices() {
        let x = iota(&[2, 3, 4]);
        let t = x.transpose();
        assert_eq!(t.shape().dims(), &[4, 3, 2]);
        for a in 0..4 {
            for b in 0..3 {
                for c in 0..2 {
                    assert_eq!(t[[a, b, c]], x[[c, b, a]]);
                }
            }
        }
        assert_eq!(t.transpose(), x);
    }

    #[test]
    fn test_permute() {
        let x = iota(&[2, 3, 4]);
        let p = x.permute(&[2, 0, 1]).unwrap();
        assert_eq!(p.shape().dims(), &[4, 2, 3]);
        assert_eq!(p[[3, 1, 2]], x[[1, 2, 3]]);
        assert!(x.permute(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_broadcast_to_shares_storage() {
        let v = Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap();
        let b = v.broadcast_to([3, 2]).unwrap();
        assert_eq!(b.to_vec(), vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        assert!(b.shares_storage_with(&v));
    }

    #[test]
    fn test_reshape_contiguous_shares_storage() {
        let t = iota(&[2, 3]);
        let r = t.reshape([3, 2]).unwrap();
        assert!(r.shares_storage_with(&t));
        assert_eq!(r.to_vec(), t.to_vec());
        assert!(t.reshape([4]).is_err());
    }

    #[test]
    fn test_reshape_view_copies() {
        let t = iota(&[2, 3]).transpose();
        let r = t.reshape([6]).unwrap();
        assert!(!r.shares_storage_with(&t));
        assert_eq!(r.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_views_keep_base_alive() {
        let view = {
            let base = iota(&[2, 2]);
            base.view(&[1]).unwrap()
        };
        assert_eq!(view.to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_is_shared_tracks_live_views() {
        let base = iota(&[2, 2]);
        assert!(!base.is_shared());
        let view = base.view(&[0]).unwrap();
        assert!(base.is_shared());
        assert!(view.is_shared());
        drop(view);
        assert!(!base.is_shared());
    }

    #[test]
    fn test_equality_is_logical() {
        let a = iota(&[2, 2]).transpose();
        let b = Tensor::from_vec(vec![1.0, 3.0, 2.0, 4.0], [2, 2]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b.reshape([4]).unwrap());
    }

    #[test]
    fn test_contiguous() {
        let t = iota(&[2, 3]).transpose();
        let c = t.contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c, t);
    }
}
