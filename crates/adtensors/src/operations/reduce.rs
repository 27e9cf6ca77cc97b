//! Reductions.
//!
//! All reductions accumulate in row-major order of the input.

use crate::error::TensorError;
use crate::layout::{Layout, ViewSpec};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Sum of all elements as a rank-0 tensor.
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::operations::sum;
///
/// let t = Tensor::arange(5);
/// assert_eq!(sum(&t).item().unwrap(), 10.0);
/// ```
pub fn sum(a: &Tensor) -> Tensor {
    Tensor::scalar(a.iter().sum())
}

/// Sum along `axis`, removing it from the shape.
///
/// # Errors
///
/// Returns `TensorError::InvalidAxis` if `axis >= rank`.
pub fn sum_axis(a: &Tensor, axis: usize) -> Result<Tensor, TensorError> {
    let rank = a.rank();
    if axis >= rank {
        return Err(TensorError::InvalidAxis { axis, rank });
    }
    let kept = a.shape().without_axis(axis).with_unit_axis(axis);
    let summed = sum_to_shape(a, &kept)?;
    summed.reshape(a.shape().without_axis(axis))
}

/// Reduce `a` to `target` by summing over every axis along which `target`
/// would be broadcast to reach `a`'s shape.
///
/// This is the inverse of broadcasting: summing over leading extra axes and
/// over axes where `target` has size 1.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` unless `target` broadcasts to
/// `a.shape()`.
///
/// # Example
///
/// ```
/// use adtensors::{Shape, Tensor};
/// use adtensors::operations::sum_to_shape;
///
/// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
/// let r = sum_to_shape(&t, &Shape::from([2])).unwrap();
/// assert_eq!(r.to_vec(), vec![4.0, 6.0]);
/// ```
pub fn sum_to_shape(a: &Tensor, target: &Shape) -> Result<Tensor, TensorError> {
    if a.shape() == target {
        return Ok(a.clone());
    }
    if !target.broadcasts_to(a.shape()) {
        return Err(TensorError::shape_mismatch("sum_to_shape", a.shape(), target));
    }
    let mut data = vec![0.0; target.numel()];
    Layout::contiguous(target.clone())
        .apply(&ViewSpec::BroadcastTo(a.shape().clone()))?
        .scatter_add(&mut data, a.iter())?;
    Tensor::from_vec(data, target)
}
