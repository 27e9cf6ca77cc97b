//! Reverse replay of a trace.

use super::gradients::Gradients;
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::tensor::Tensor;
use log::trace;

/// Propagate adjoints from `output`, seeded with ones of its shape.
///
/// For a scalar output this yields the gradient of every tracked value that
/// contributed to it.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::autodiff::{DiffOptions, Trace, backward};
///
/// let trace = Trace::new(DiffOptions::default());
/// let x = trace.leaf(Tensor::from_vec(vec![1.0, 2.0, 3.0], [3]).unwrap());
/// let loss = x.pow(2.0).unwrap().sum().unwrap();
///
/// let grads = backward(&loss).unwrap();
/// assert_eq!(grads.of(&x).to_vec(), vec![2.0, 4.0, 6.0]);
/// ```
pub fn backward(output: &TrackedTensor) -> Result<Gradients, TensorError> {
    backward_with_seed(output, &Tensor::ones(output.shape()))
}

/// Propagate adjoints from `output`, seeded with `seed`.
///
/// Nodes are replayed in reverse creation order, which is a valid reverse
/// topological order. Contributions to one value are summed sequentially in
/// that order.
///
/// # Errors
///
/// - `ShapeMismatch` if `seed` is not shaped like `output`.
/// - `UnsupportedOperator` when the adjoint has to pass through a node whose
///   operator has no vector-Jacobian rule.
pub fn backward_with_seed(output: &TrackedTensor, seed: &Tensor) -> Result<Gradients, TensorError> {
    if seed.shape() != output.shape() {
        return Err(TensorError::shape_mismatch(
            "seed",
            output.shape(),
            seed.shape(),
        ));
    }
    let mut gradients = Gradients::new();
    let (Some(trace), Some(output_id)) = (output.trace(), output.id()) else {
        // constant output: every derivative is zero
        return Ok(gradients);
    };
    gradients.accumulate(output_id, seed.clone())?;

    let nodes = trace.nodes();
    for node in nodes.iter().rev() {
        if node.output_id() > output_id {
            continue;
        }
        let Some(adjoint) = gradients.remove(node.output_id()) else {
            continue;
        };
        trace!("vjp {} at {}", node.op().name(), node.output_id().index());
        let contributions = node.op().vjp(
            node.primals(),
            node.output(),
            &adjoint,
            &trace.options().kernels,
        )?;
        for (input, grad) in node.inputs().iter().zip(contributions) {
            if let (Some(id), Some(grad)) = (input, grad) {
                gradients.accumulate(*id, grad)?;
            }
        }
    }
    Ok(gradients)
}
