//! Matrix multiplication.

use crate::backend::{GenericKernel, Kernel, KernelRegistry, KernelSignature};
use crate::error::TensorError;
use crate::shape::Shape;
use crate::tensor::Tensor;

fn output_shape(a: &Tensor, b: &Tensor) -> Result<Shape, TensorError> {
    if a.rank() != 2 || b.rank() != 2 || a.shape()[1] != b.shape()[0] {
        return Err(TensorError::shape_mismatch("matmul", a.shape(), b.shape()));
    }
    Ok(Shape::from([a.shape()[0], b.shape()[1]]))
}

/// Matrix product of two rank-2 tensors using the built-in loops.
///
/// # Errors
///
/// Returns `TensorError::ShapeMismatch` unless `a` is `(m, k)` and `b` is
/// `(k, n)`.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::operations::matmul;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
/// let i = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], [2, 2]).unwrap();
/// assert_eq!(matmul(&a, &i).unwrap(), a);
/// ```
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    matmul_with(a, b, &KernelRegistry::empty())
}

/// Matrix product, delegating to the first kernel in `kernels` that
/// supports the shapes and falling back to the built-in loops.
pub fn matmul_with(
    a: &Tensor,
    b: &Tensor,
    kernels: &KernelRegistry,
) -> Result<Tensor, TensorError> {
    let output = output_shape(a, b)?;
    let signature = KernelSignature::new("matmul", &[a, b]);
    if let Some(c) = kernels.dispatch(&signature, &[a, b], &output)? {
        return Ok(c);
    }
    let a_data = a.to_vec();
    let b_data = b.to_vec();
    let data = GenericKernel.evaluate(&signature, &[a_data.as_slice(), b_data.as_slice()], &output)?;
    Tensor::from_vec(data, output)
}
