//! Generic (naive loop-based) kernel implementation.

use super::{Kernel, KernelSignature};
use crate::error::TensorError;
use crate::shape::Shape;

/// Kernel using naive loop-based implementations.
///
/// This kernel is always available and serves as a fallback.
/// It's suitable for small tensors and debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericKernel;

/// Row-major `(m, k) x (k, n)` product with a plain triple loop.
pub(crate) fn matmul_loops(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let aip = a[i * k + p];
            let row = &b[p * n..(p + 1) * n];
            for (cij, &bpj) in c[i * n..(i + 1) * n].iter_mut().zip(row) {
                *cij += aip * bpj;
            }
        }
    }
    c
}

impl Kernel for GenericKernel {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn supports(&self, signature: &KernelSignature) -> bool {
        signature.op == "matmul" && signature.inputs.iter().all(|s| s.rank() == 2)
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
        Ok(matmul_loops(a, b, m, k, n))
    }
}
