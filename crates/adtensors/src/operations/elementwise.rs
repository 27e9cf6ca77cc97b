//! Element-wise tensor operations.
//!
//! Binary operations broadcast their operands (see [`Shape::broadcast`]).
//! Operands are replicated through zero-stride views, so the smaller operand
//! is never materialised at the larger shape.

use crate::error::TensorError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Combine two tensors element by element after broadcasting them together.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` (tagged with `op`) if the shapes do
/// not broadcast.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::operations::zip_with;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
/// let b = Tensor::from_vec(vec![10.0, 20.0], [2]).unwrap();
/// let c = zip_with("add", &a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.to_vec(), vec![11.0, 22.0, 13.0, 24.0]);
/// ```
pub fn zip_with(
    op: &'static str,
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Tensor, TensorError> {
    let shape = Shape::broadcast(a.shape(), b.shape())
        .map_err(|_| TensorError::shape_mismatch(op, a.shape(), b.shape()))?;
    let a = a.broadcast_to(&shape)?;
    let b = b.broadcast_to(&shape)?;
    let data = a.iter().zip(b.iter()).map(|(x, y)| f(x, y)).collect();
    Tensor::from_vec(data, shape)
}

pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    zip_with("add", a, b, |x, y| x + y)
}

pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    zip_with("sub", a, b, |x, y| x - y)
}

pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    zip_with("mul", a, b, |x, y| x * y)
}

pub fn div(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    zip_with("div", a, b, |x, y| x / y)
}

pub fn neg(a: &Tensor) -> Tensor {
    a.map(|x| -x)
}

/// Multiply all elements by a scalar, returning a new tensor.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::operations::scale;
///
/// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], [3]).unwrap();
/// assert_eq!(scale(&t, 2.0).to_vec(), vec![2.0, 4.0, 6.0]);
/// ```
pub fn scale(a: &Tensor, alpha: f64) -> Tensor {
    a.map(|x| x * alpha)
}

/// Raise every element to a constant power.
pub fn pow(a: &Tensor, exponent: f64) -> Tensor {
    if exponent == 2.0 {
        a.map(|x| x * x)
    } else {
        a.map(|x| x.powf(exponent))
    }
}

pub fn exp(a: &Tensor) -> Tensor {
    a.map(f64::exp)
}

/// Natural logarithm.
pub fn ln(a: &Tensor) -> Tensor {
    a.map(f64::ln)
}

pub fn sin(a: &Tensor) -> Tensor {
    a.map(f64::sin)
}

pub fn cos(a: &Tensor) -> Tensor {
    a.map(f64::cos)
}

/// `max(x, 0)` per element.
pub fn relu(a: &Tensor) -> Tensor {
    a.map(|x| if x > 0.0 { x } else { 0.0 })
}

/// 1 where `x > 0`, else 0. The derivative of [`relu`], taking 0 at the kink.
pub fn relu_mask(a: &Tensor) -> Tensor {
    a.map(|x| if x > 0.0 { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vec1(data: &[f64]) -> Tensor {
        Tensor::from_vec(data.to_vec(), [data.len()]).unwrap()
    }

    #[test]
    fn test_add_same_shape() {
        let c = add(&vec1(&[1.0, 2.0]), &vec1(&[3.0, 4.0])).unwrap();
        assert_eq!(c.to_vec(), vec![4.0, 6.0]);
    }

    #[test]
    fn test_broadcast_scalar() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
        let c = mul(&a, &Tensor::scalar(2.0)).unwrap();
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.to_vec(), vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_broadcast_column_and_row() {
        let col = Tensor::from_vec(vec![1.0, 2.0, 3.0], [3, 1]).unwrap();
        let row = Tensor::from_vec(vec![10.0, 20.0, 30.0], [1, 3]).unwrap();
        let c = add(&col, &row).unwrap();
        assert_eq!(c.shape().dims(), &[3, 3]);
        assert_eq!(c.get(&[2, 1]).unwrap(), 23.0);
    }

    #[test]
    fn test_shape_mismatch_names_op() {
        let err = sub(&Tensor::zeros([2, 3]), &Tensor::zeros([2, 4])).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "sub", .. }));
    }

    #[test]
    fn test_on_views() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
        let c = sub(&a.transpose(), &a).unwrap();
        assert_eq!(c.to_vec(), vec![0.0, 1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_unary() {
        let t = vec1(&[-1.0, 0.0, 2.0]);
        assert_eq!(relu(&t).to_vec(), vec![0.0, 0.0, 2.0]);
        assert_eq!(relu_mask(&t).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(neg(&t).to_vec(), vec![1.0, -0.0, -2.0]);
        assert_eq!(pow(&t, 2.0).to_vec(), vec![1.0, 0.0, 4.0]);
        assert_relative_eq!(pow(&vec1(&[4.0]), 0.5).item().unwrap(), 2.0);
        assert_relative_eq!(exp(&vec1(&[1.0])).item().unwrap(), std::f64::consts::E);
        assert_relative_eq!(ln(&vec1(&[std::f64::consts::E])).item().unwrap(), 1.0);
        assert_relative_eq!(sin(&vec1(&[0.0])).item().unwrap(), 0.0);
        assert_relative_eq!(cos(&vec1(&[0.0])).item().unwrap(), 1.0);
    }

    #[test]
    fn test_div() {
        let c = div(&vec1(&[1.0, 9.0]), &vec1(&[2.0, 3.0])).unwrap();
        assert_eq!(c.to_vec(), vec![0.5, 3.0]);
    }
}
