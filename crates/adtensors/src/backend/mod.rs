//! Pluggable forward-evaluation kernels.
//!
//! An operator's forward rule may hand its primal inputs to an external
//! accelerated routine. Kernels are looked up by a [`KernelSignature`]
//! (operator name plus input shapes; the element type is always `f64`).
//!
//! # Contract
//!
//! Given dense row-major input buffers and a declared output shape, a kernel
//! returns a buffer with exactly `output.numel()` elements. It must have no
//! side effects and hold no shared mutable state; the registry calls it
//! synchronously. A buffer of the wrong length is rejected with
//! `TensorError::ShapeMismatch`.
//!
//! # Kernels
//!
//! - [`GenericKernel`]: naive loops (always available, also the fallback)
//! - [`FaerKernel`]: GEMM through faer

mod faer_interop;
mod generic;

pub use faer_interop::FaerKernel;
pub use generic::GenericKernel;

use crate::error::TensorError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::debug;
use std::fmt::Debug;
use std::sync::Arc;

/// Lookup key for a kernel: operator name and input shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSignature {
    pub op: &'static str,
    pub inputs: Vec<Shape>,
}

impl KernelSignature {
    pub fn new(op: &'static str, inputs: &[&Tensor]) -> Self {
        Self {
            op,
            inputs: inputs.iter().map(|t| t.shape().clone()).collect(),
        }
    }
}

/// An accelerated forward-evaluation routine.
pub trait Kernel: Debug + Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this kernel can evaluate `signature`.
    fn supports(&self, signature: &KernelSignature) -> bool;

    /// Evaluate on dense row-major inputs, returning `output.numel()` elements.
    fn evaluate(
        &self,
        signature: &KernelSignature,
        inputs: &[&[f64]],
        output: &Shape,
    ) -> Result<Vec<f64>, TensorError>;
}

/// Ordered set of kernels. Later registrations take precedence.
#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: Vec<Arc<dyn Kernel>>,
}

impl KernelRegistry {
    /// Registry with no kernels: every operator uses its built-in loops.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the faer GEMM kernel.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(FaerKernel));
        registry
    }

    pub fn register(&mut self, kernel: Arc<dyn Kernel>) {
        self.kernels.push(kernel);
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Most recently registered kernel supporting `signature`.
    pub fn find(&self, signature: &KernelSignature) -> Option<&dyn Kernel> {
        self.kernels
            .iter()
            .rev()
            .find(|k| k.supports(signature))
            .map(|k| k.as_ref())
    }

    /// Evaluate through a registered kernel, if one supports the signature.
    ///
    /// Returns `Ok(None)` when no kernel applies so the caller can fall back.
    pub fn dispatch(
        &self,
        signature: &KernelSignature,
        inputs: &[&Tensor],
        output: &Shape,
    ) -> Result<Option<Tensor>, TensorError> {
        let Some(kernel) = self.find(signature) else {
            return Ok(None);
        };
        debug!(
            "dispatching {} {:?} to kernel {}",
            signature.op,
            signature.inputs,
            kernel.name()
        );
        let buffers: Vec<Vec<f64>> = inputs.iter().map(|t| t.to_vec()).collect();
        let slices: Vec<&[f64]> = buffers.iter().map(|b| b.as_slice()).collect();
        let data = kernel.evaluate(signature, &slices, output)?;
        if data.len() != output.numel() {
            return Err(TensorError::shape_mismatch(
                signature.op,
                output,
                [data.len()],
            ));
        }
        Tensor::from_vec(data, output).map(Some)
    }
}
