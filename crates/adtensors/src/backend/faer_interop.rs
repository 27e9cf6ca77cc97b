//! GEMM kernel backed by faer.
//!
//! Buffers are row-major, so they are viewed through faer's row-major slice
//! constructors (zero-copy) and the product is written straight into the
//! output buffer.

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};

use super::{Kernel, KernelSignature};
use crate::error::TensorError;
use crate::shape::Shape;

/// Matrix multiplication through `faer::linalg::matmul`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerKernel;

fn gemm(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    if m == 0 || n == 0 || k == 0 {
        return c;
    }
    let a_mat = MatRef::from_row_major_slice(a, m, k);
    let b_mat = MatRef::from_row_major_slice(b, k, n);
    let mut c_mat = MatMut::from_row_major_slice_mut(&mut c, m, n);

    // C = 1 * A * B, overwriting C
    matmul(c_mat.as_mut(), Accum::Replace, a_mat, b_mat, 1.0, Par::Seq);
    c
}

impl Kernel for FaerKernel {
    fn name(&self) -> &'static str {
        "faer"
    }

    fn supports(&self, signature: &KernelSignature) -> bool {
        signature.op == "matmul"
            && signature.inputs.len() == 2
            && signature.inputs.iter().all(|s| s.rank() == 2)
            && signature.inputs[0][1] == signature.inputs[1][0]
    }

    fn evaluate(
        &self,
        signature: &KernelSignature,
        inputs: &[&[f64]],
        _output: &Shape,
    ) -> Result<Vec<f64>, TensorError> {
        let [a, b] = inputs else {
            return Err(TensorError::InvalidOperation(format!(
                "matmul expects 2 inputs, got {}",
                inputs.len()
            )));
        };
        let (m, k, n) = (
            signature.inputs[0][0],
            signature.inputs[0][1],
            signature.inputs[1][1],
        );
        Ok(gemm(a, b, m, k, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::generic::matmul_loops;
    use approx::assert_relative_eq;

    #[test]
    fn test_gemm_matches_loops() {
        let a: Vec<f64> = (1..=6).map(|x| x as f64).collect();
        let b: Vec<f64> = (1..=12).map(|x| x as f64 * 0.5).collect();
        let fast = gemm(&a, &b, 2, 3, 4);
        let slow = matmul_loops(&a, &b, 2, 3, 4);
        for (x, y) in fast.iter().zip(slow.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_supports_requires_matching_inner_dim() {
        let sig = KernelSignature {
            op: "matmul",
            inputs: vec![Shape::from([2, 3]), Shape::from([4, 2])],
        };
        assert!(!FaerKernel.supports(&sig));
    }
}
