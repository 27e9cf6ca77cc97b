//! Strided layouts and view transforms.
//!
//! Storage is row-major (C order): the last axis varies fastest. A view is a
//! [`Layout`] over a shared buffer. Transforms only touch shape, strides and
//! offset, so building a view never copies element data.
//!
//! A stride of 0 replicates an element virtually, which is how broadcasting
//! is evaluated without materialising the larger operand.

use crate::error::TensorError;
use crate::shape::Shape;
use smallvec::SmallVec;
use std::ops::Range;

pub(crate) type Strides = SmallVec<[usize; 4]>;

/// Compute row-major strides from shape.
///
/// For shape [d0, d1, d2], returns strides [d1*d2, d2, 1].
///
/// # Examples
///
/// ```
/// use adtensors::layout::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![20, 5, 1]);
/// assert_eq!(compute_strides(&[2, 3]), vec![3, 1]);
/// assert_eq!(compute_strides(&[5]), vec![1]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    for (s, &dim) in strides.iter_mut().zip(shape.iter()).rev() {
        *s = stride;
        stride *= dim;
    }
    strides
}

/// Convert cartesian indices to a linear offset.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a row-major linear index to cartesian indices.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; shape.len()];
    for (idx, &dim) in indices.iter_mut().zip(shape.iter()).rev() {
        *idx = linear % dim;
        linear /= dim;
    }
    indices
}

/// Selection along a single axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisIndex {
    /// Pick one position; the axis disappears.
    At(usize),
    /// Keep a contiguous range; the axis shrinks to the range length.
    Range(Range<usize>),
}

impl From<usize> for AxisIndex {
    fn from(i: usize) -> Self {
        AxisIndex::At(i)
    }
}

impl From<Range<usize>> for AxisIndex {
    fn from(r: Range<usize>) -> Self {
        AxisIndex::Range(r)
    }
}

/// An index-mapping transform from a base tensor to a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSpec {
    /// Consume leading axes.
    Index(Vec<usize>),
    /// Select along one axis.
    Axis { axis: usize, index: AxisIndex },
    /// Reorder axes: axis `i` of the view is axis `perm[i]` of the base.
    Permute(Vec<usize>),
    /// Reverse all axes.
    Transpose,
    /// Virtually replicate size-1 (or missing leading) axes.
    BroadcastTo(Shape),
}

/// Shape, strides and offset of a tensor within its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Dense row-major layout starting at offset 0.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = compute_strides(shape.dims()).into_iter().collect();
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether elements occupy `offset..offset + numel` in row-major order.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1;
        for (&dim, &stride) in self.shape.dims().iter().zip(self.strides.iter()).rev() {
            if dim != 1 && stride != expected {
                return false;
            }
            expected *= dim;
        }
        true
    }

    /// Storage offset of a full multi-index, with bounds checking.
    pub fn offset_of(&self, indices: &[usize]) -> Result<usize, TensorError> {
        if indices.len() != self.shape.rank() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.shape.rank(),
                actual: indices.len(),
            });
        }
        self.check_indices(indices)?;
        Ok(self.offset + cartesian_to_linear(indices, &self.strides))
    }

    fn check_indices(&self, indices: &[usize]) -> Result<(), TensorError> {
        for (axis, (&index, &size)) in indices.iter().zip(self.shape.dims()).enumerate() {
            if index >= size {
                return Err(TensorError::IndexOutOfRange { index, axis, size });
            }
        }
        Ok(())
    }

    /// Apply a view transform, producing the layout of the view.
    pub fn apply(&self, spec: &ViewSpec) -> Result<Layout, TensorError> {
        match spec {
            ViewSpec::Index(indices) => self.index(indices),
            ViewSpec::Axis { axis, index } => self.select(*axis, index),
            ViewSpec::Permute(perm) => self.permute(perm),
            ViewSpec::Transpose => Ok(self.transposed()),
            ViewSpec::BroadcastTo(target) => self.broadcast_to(target),
        }
    }

    pub(crate) fn transposed(&self) -> Layout {
        Layout {
            shape: self.shape.reversed(),
            strides: self.strides.iter().rev().copied().collect(),
            offset: self.offset,
        }
    }

    fn index(&self, indices: &[usize]) -> Result<Layout, TensorError> {
        let rank = self.shape.rank();
        if indices.len() > rank {
            return Err(TensorError::WrongNumberOfIndices {
                expected: rank,
                actual: indices.len(),
            });
        }
        self.check_indices(indices)?;
        let n = indices.len();
        Ok(Layout {
            shape: Shape::from(&self.shape.dims()[n..]),
            strides: SmallVec::from_slice(&self.strides[n..]),
            offset: self.offset + cartesian_to_linear(indices, &self.strides[..n]),
        })
    }

    fn select(&self, axis: usize, index: &AxisIndex) -> Result<Layout, TensorError> {
        let rank = self.shape.rank();
        if axis >= rank {
            return Err(TensorError::InvalidAxis { axis, rank });
        }
        let size = self.shape[axis];
        let stride = self.strides[axis];
        match index {
            AxisIndex::At(i) => {
                if *i >= size {
                    return Err(TensorError::IndexOutOfRange {
                        index: *i,
                        axis,
                        size,
                    });
                }
                let mut strides = self.strides.clone();
                strides.remove(axis);
                Ok(Layout {
                    shape: self.shape.without_axis(axis),
                    strides,
                    offset: self.offset + i * stride,
                })
            }
            AxisIndex::Range(range) => {
                if range.end > size {
                    return Err(TensorError::IndexOutOfRange {
                        index: range.end,
                        axis,
                        size,
                    });
                }
                if range.start > range.end {
                    return Err(TensorError::IndexOutOfRange {
                        index: range.start,
                        axis,
                        size: range.end,
                    });
                }
                let mut dims = self.shape.dims().to_vec();
                dims[axis] = range.len();
                Ok(Layout {
                    shape: Shape::from(dims),
                    strides: self.strides.clone(),
                    offset: self.offset + range.start * stride,
                })
            }
        }
    }

    fn permute(&self, perm: &[usize]) -> Result<Layout, TensorError> {
        let rank = self.shape.rank();
        let mut seen = vec![false; rank];
        let valid = perm.len() == rank
            && perm.iter().all(|&p| p < rank && !std::mem::replace(&mut seen[p], true));
        if !valid {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
                rank,
            });
        }
        Ok(Layout {
            shape: perm.iter().map(|&p| self.shape[p]).collect(),
            strides: perm.iter().map(|&p| self.strides[p]).collect(),
            offset: self.offset,
        })
    }

    fn broadcast_to(&self, target: &Shape) -> Result<Layout, TensorError> {
        if !self.shape.broadcasts_to(target) {
            return Err(TensorError::shape_mismatch(
                "broadcast_to",
                &self.shape,
                target,
            ));
        }
        let pad = target.rank() - self.shape.rank();
        let strides = (0..target.rank())
            .map(|i| {
                if i < pad || self.shape[i - pad] != target[i] {
                    0
                } else {
                    self.strides[i - pad]
                }
            })
            .collect();
        Ok(Layout {
            shape: target.clone(),
            strides,
            offset: self.offset,
        })
    }

    /// Same strides and offset, new shape. Caller guarantees contiguity.
    pub(crate) fn reshaped_contiguous(&self, shape: Shape) -> Layout {
        let strides = compute_strides(shape.dims()).into_iter().collect();
        Layout {
            shape,
            strides,
            offset: self.offset,
        }
    }

    /// Add `values` (row-major over this layout's shape) into `dest` at the
    /// storage positions this layout addresses.
    ///
    /// Positions addressed more than once, as with a broadcast layout,
    /// receive the sum of their contributions.
    pub fn scatter_add(
        &self,
        dest: &mut [f64],
        values: impl IntoIterator<Item = f64>,
    ) -> Result<(), TensorError> {
        let end = self.offsets().max().map_or(0, |o| o + 1);
        if end > dest.len() {
            return Err(TensorError::IndexOutOfRange {
                index: end - 1,
                axis: 0,
                size: dest.len(),
            });
        }
        for (offset, value) in self.offsets().zip(values) {
            dest[offset] += value;
        }
        Ok(())
    }

    /// Storage offsets of every element in row-major logical order.
    pub fn offsets(&self) -> Offsets<'_> {
        let remaining = self.shape.numel();
        Offsets {
            layout: self,
            index: SmallVec::from_elem(0, self.shape.rank()),
            current: self.offset,
            remaining,
        }
    }
}

/// Iterator over storage offsets, see [`Layout::offsets`].
#[derive(Debug)]
pub struct Offsets<'a> {
    layout: &'a Layout,
    index: SmallVec<[usize; 4]>,
    current: usize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        self.remaining -= 1;
        if self.remaining > 0 {
            let dims = self.layout.shape.dims();
            for axis in (0..dims.len()).rev() {
                let stride = self.layout.strides[axis];
                self.index[axis] += 1;
                self.current += stride;
                if self.index[axis] < dims[axis] {
                    break;
                }
                self.current -= stride * dims[axis];
                self.index[axis] = 0;
            }
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}
