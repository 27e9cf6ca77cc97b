//! Comparisons and conditional selection.

use super::elementwise::zip_with;
use crate::error::TensorError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Element-wise comparison kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparison {
    pub fn name(self) -> &'static str {
        match self {
            Comparison::Gt => "gt",
            Comparison::Ge => "ge",
            Comparison::Lt => "lt",
            Comparison::Le => "le",
            Comparison::Eq => "eq",
        }
    }

    pub fn holds(self, x: f64, y: f64) -> bool {
        match self {
            Comparison::Gt => x > y,
            Comparison::Ge => x >= y,
            Comparison::Lt => x < y,
            Comparison::Le => x <= y,
            Comparison::Eq => x == y,
        }
    }
}

/// Compare with broadcasting, producing 1.0 where the comparison holds and
/// 0.0 elsewhere.
pub fn compare(a: &Tensor, b: &Tensor, cmp: Comparison) -> Result<Tensor, TensorError> {
    zip_with(cmp.name(), a, b, |x, y| if cmp.holds(x, y) { 1.0 } else { 0.0 })
}

/// Take `a` where `cond > 0` and `b` elsewhere, broadcasting all three.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::operations::select;
///
/// let cond = Tensor::from_vec(vec![1.0, 0.0, -2.0], [3]).unwrap();
/// let r = select(&cond, &Tensor::scalar(7.0), &Tensor::arange(3)).unwrap();
/// assert_eq!(r.to_vec(), vec![7.0, 1.0, 2.0]);
/// ```
pub fn select(cond: &Tensor, a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let shape = Shape::broadcast(a.shape(), b.shape())
        .and_then(|s| Shape::broadcast(cond.shape(), &s))
        .map_err(|_| TensorError::shape_mismatch("select", a.shape(), b.shape()))?;
    let cond = cond.broadcast_to(&shape)?;
    let a = a.broadcast_to(&shape)?;
    let b = b.broadcast_to(&shape)?;
    let data = cond
        .iter()
        .zip(a.iter().zip(b.iter()))
        .map(|(c, (x, y))| if c > 0.0 { x } else { y })
        .collect();
    Tensor::from_vec(data, shape)
}
