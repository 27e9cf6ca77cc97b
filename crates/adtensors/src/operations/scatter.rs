//! Scattering view-shaped values back into a base shape.

use crate::error::TensorError;
use crate::layout::{Layout, ViewSpec};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Place `values` at the positions that `spec` selects from a dense tensor
/// of shape `base`, leaving every other position zero.
///
/// Positions selected more than once (broadcast views) receive the sum of
/// their values.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` if `values` is not shaped like the
/// view, and propagates any error from applying `spec` to `base`.
///
/// # Example
///
/// ```
/// use adtensors::{Shape, Tensor, ViewSpec};
/// use adtensors::operations::scatter_view;
///
/// let row = Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap();
/// let base = scatter_view(&row, &Shape::from([2, 2]), &ViewSpec::Index(vec![1])).unwrap();
/// assert_eq!(base.to_vec(), vec![0.0, 0.0, 1.0, 2.0]);
/// ```
pub fn scatter_view(values: &Tensor, base: &Shape, spec: &ViewSpec) -> Result<Tensor, TensorError> {
    let view = Layout::contiguous(base.clone()).apply(spec)?;
    if view.shape() != values.shape() {
        return Err(TensorError::shape_mismatch(
            "scatter_view",
            view.shape(),
            values.shape(),
        ));
    }
    let mut data = vec![0.0; base.numel()];
    view.scatter_add(&mut data, values.iter())?;
    Tensor::from_vec(data, base)
}
