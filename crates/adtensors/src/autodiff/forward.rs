//! Forward (tangent) propagation through a trace.

use super::tensor::TrackedTensor;
use super::trace::LeafId;
use crate::error::TensorError;
use crate::tensor::Tensor;
use log::trace;
use std::collections::HashMap;

/// Tangent of `output` given tangents on some tracked values.
///
/// Values without a seed have zero tangent. Nodes are visited in creation
/// order, applying each operator's Jacobian-vector rule.
///
/// # Errors
///
/// - `ShapeMismatch` if a seed is not shaped like the value it perturbs.
/// - `UnsupportedOperator` when a nonzero tangent reaches a node whose
///   operator has no Jacobian-vector rule.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use adtensors::Tensor;
/// use adtensors::autodiff::{DiffOptions, Trace, forward};
///
/// let trace = Trace::new(DiffOptions::default());
/// let x = trace.leaf(Tensor::scalar(3.0));
/// let y = x.pow(2.0).unwrap();
///
/// let seeds = HashMap::from([(x.id().unwrap(), Tensor::scalar(1.0))]);
/// assert_eq!(forward(&y, &seeds).unwrap().item().unwrap(), 6.0);
/// ```
pub fn forward(
    output: &TrackedTensor,
    seeds: &HashMap<LeafId, Tensor>,
) -> Result<Tensor, TensorError> {
    let zero = || Tensor::zeros(output.shape());
    let (Some(trace), Some(output_id)) = (output.trace(), output.id()) else {
        return Ok(zero());
    };

    let mut tangents: HashMap<LeafId, Tensor> = seeds.clone();
    let nodes = trace.nodes();
    for node in nodes.iter() {
        if node.output_id() > output_id {
            break;
        }
        for (id, primal) in node.inputs().iter().zip(node.primals()) {
            if let Some(t) = id.and_then(|id| tangents.get(&id)) {
                if t.shape() != primal.shape() {
                    return Err(TensorError::shape_mismatch("tangent", primal.shape(), t.shape()));
                }
            }
        }
        let inputs: Vec<Option<Tensor>> = node
            .inputs()
            .iter()
            .map(|id| id.and_then(|id| tangents.get(&id).cloned()))
            .collect();
        if inputs.iter().all(Option::is_none) {
            continue;
        }
        trace!("jvp {} at {}", node.op().name(), node.output_id().index());
        let tangent = node.op().jvp(
            node.primals(),
            node.output(),
            &inputs,
            &trace.options().kernels,
        )?;
        if let Some(tangent) = tangent {
            tangents.insert(node.output_id(), tangent);
        }
    }
    Ok(tangents.remove(&output_id).unwrap_or_else(zero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{DiffOptions, Trace};
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_product_rule() {
        let trace = Trace::new(DiffOptions::default());
        let x = trace.leaf(Tensor::scalar(2.0));
        let y = trace.leaf(Tensor::scalar(5.0));
        let z = x.mul(&y).unwrap().sin().unwrap();
        let seeds = HashMap::from([(y.id().unwrap(), Tensor::scalar(1.0))]);
        let dz = forward(&z, &seeds).unwrap().item().unwrap();
        assert_relative_eq!(dz, 2.0 * 10.0_f64.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_unseeded_is_zero() {
        let trace = Trace::new(DiffOptions::default());
        let x = trace.leaf(Tensor::ones([2]));
        let y = x.exp().unwrap();
        assert_eq!(forward(&y, &HashMap::new()).unwrap(), Tensor::zeros([2]));
    }

    #[test]
    fn test_seed_shape_checked() {
        let trace = Trace::new(DiffOptions::default());
        let x = trace.leaf(Tensor::ones([2]));
        let y = x.exp().unwrap();
        let seeds = HashMap::from([(x.id().unwrap(), Tensor::ones([3]))]);
        assert!(matches!(
            forward(&y, &seeds),
            Err(TensorError::ShapeMismatch { op: "tangent", .. })
        ));
    }
}
