//! Integration tests for kernel dispatch through differentiation options.

use adtensors::autodiff::{DiffOptions, Differentiator, TrackedTensor};
use adtensors::backend::{GenericKernel, Kernel, KernelRegistry, KernelSignature};
use adtensors::{Shape, Tensor, TensorError};
use approx::assert_relative_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts the matmul calls it serves and delegates to the loop kernel.
#[derive(Debug, Default)]
struct CountingMatmul {
    calls: AtomicUsize,
}

impl Kernel for CountingMatmul {
    fn name(&self) -> &'static str {
        "counting_matmul"
    }

    fn supports(&self, signature: &KernelSignature) -> bool {
        signature.op == "matmul"
    }

    fn evaluate(
        &self,
        signature: &KernelSignature,
        inputs: &[&[f64]],
        output: &Shape,
    ) -> Result<Vec<f64>, TensorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        GenericKernel.evaluate(signature, inputs, output)
    }
}

/// Always answers with a buffer one element short.
#[derive(Debug)]
struct Truncating;

impl Kernel for Truncating {
    fn name(&self) -> &'static str {
        "truncating"
    }

    fn supports(&self, _signature: &KernelSignature) -> bool {
        true
    }

    fn evaluate(
        &self,
        _signature: &KernelSignature,
        _inputs: &[&[f64]],
        output: &Shape,
    ) -> Result<Vec<f64>, TensorError> {
        Ok(vec![0.0; output.numel().saturating_sub(1)])
    }
}

fn input() -> (TrackedTensor, TrackedTensor) {
    (
        Tensor::from_fn([2, 3], |i| (i[0] * 3 + i[1]) as f64 - 2.0).into(),
        Tensor::from_fn([3, 2], |i| 0.5 * (i[0] + i[1]) as f64).into(),
    )
}

fn loss(p: &(TrackedTensor, TrackedTensor)) -> Result<TrackedTensor, TensorError> {
    p.0.matmul(&p.1)?.pow(2.0)?.sum()
}

#[test]
fn test_registered_kernel_serves_forward_and_reverse() {
    let kernel = Arc::new(CountingMatmul::default());
    let mut registry = KernelRegistry::empty();
    registry.register(kernel.clone());
    let custom = Differentiator::new(DiffOptions::default().with_kernels(registry));

    let (value, grad) = custom.primal_and_gradient(&input(), loss).unwrap();
    // one forward product, two adjoint products
    assert_eq!(kernel.calls.load(Ordering::Relaxed), 3);

    let (expected, expected_grad) = Differentiator::default()
        .primal_and_gradient(&input(), loss)
        .unwrap();
    assert_relative_eq!(value.item().unwrap(), expected.item().unwrap(), epsilon = 1e-10);
    for (x, y) in grad.0.value().iter().zip(expected_grad.0.value().iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-10);
    }
    for (x, y) in grad.1.value().iter().zip(expected_grad.1.value().iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-10);
    }
}

#[test]
fn test_kernel_with_wrong_output_length_is_rejected() {
    let mut registry = KernelRegistry::with_defaults();
    registry.register(Arc::new(Truncating));
    let d = Differentiator::new(DiffOptions::default().with_kernels(registry));
    let err = d.primal_and_gradient(&input(), loss).unwrap_err();
    assert!(matches!(err, TensorError::ShapeMismatch { op: "matmul", .. }));
}
