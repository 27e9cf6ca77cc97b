//! Trace export for external caching layers.
//!
//! A [`TracePlan`] is the node sequence of one call, detached from that call.
//! A cache keyed by ([`ShapeSignature`], function identity) can store plans
//! and replay them against new primal values of the same shapes instead of
//! running the user function again. Replay evaluates the same operators in
//! the same order, so results match re-tracing up to summation order.

use super::backward::backward;
use super::options::DiffOptions;
use super::tensor::TrackedTensor;
use super::trace::{LeafId, Trace, TraceNode};
use super::wrap::Differentiable;
use crate::error::TensorError;
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::{debug, trace};
use std::collections::HashMap;

/// Input leaf shapes, in wrap order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeSignature(Vec<Shape>);

impl ShapeSignature {
    pub fn shapes(&self) -> &[Shape] {
        &self.0
    }

    pub fn of<I: Differentiable>(input: &I) -> Self {
        Self(input.leaf_shapes())
    }
}

#[derive(Debug, Clone)]
enum PlanOutput {
    Value(LeafId),
    Constant(Tensor),
}

/// A recorded, replayable node sequence.
#[derive(Debug, Clone)]
pub struct TracePlan {
    signature: ShapeSignature,
    inputs: Vec<LeafId>,
    nodes: Vec<TraceNode>,
    output: PlanOutput,
    options: DiffOptions,
}

impl TracePlan {
    pub(crate) fn export<I: Differentiable>(
        trace: &Trace,
        wrapped: &I,
        output: &TrackedTensor,
    ) -> Result<Self, TensorError> {
        let mut inputs = Vec::new();
        let mut untracked = false;
        wrapped.visit_leaves(&mut |leaf| match leaf.id() {
            Some(id) => inputs.push(id),
            None => untracked = true,
        });
        if untracked {
            return Err(TensorError::InvalidOperation(
                "cannot export a trace with untracked inputs".to_string(),
            ));
        }
        let output = match output.id() {
            Some(id) => PlanOutput::Value(id),
            None => PlanOutput::Constant(output.value().clone()),
        };
        let nodes = trace.nodes().to_vec();
        debug!("exported plan with {} inputs, {} nodes", inputs.len(), nodes.len());
        Ok(Self {
            signature: ShapeSignature::of(wrapped),
            inputs,
            nodes,
            output,
            options: trace.options().clone(),
        })
    }

    pub fn signature(&self) -> &ShapeSignature {
        &self.signature
    }

    /// Recorded nodes in creation order.
    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check_inputs(&self, inputs: &[Tensor]) -> Result<(), TensorError> {
        let expected = self.signature.shapes();
        if inputs.len() != expected.len() {
            return Err(TensorError::InvalidOperation(format!(
                "plan expects {} inputs, got {}",
                expected.len(),
                inputs.len()
            )));
        }
        for (input, shape) in inputs.iter().zip(expected) {
            if input.shape() != shape {
                return Err(TensorError::shape_mismatch("replay", shape, input.shape()));
            }
        }
        Ok(())
    }

    /// Evaluate the plan on new input values (in wrap order).
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for the wrong number of inputs, `ShapeMismatch` if
    /// an input's shape differs from the recorded one.
    pub fn replay(&self, inputs: &[Tensor]) -> Result<Tensor, TensorError> {
        self.check_inputs(inputs)?;
        let mut env: HashMap<LeafId, Tensor> =
            self.inputs.iter().copied().zip(inputs.iter().cloned()).collect();
        for node in &self.nodes {
            let values = node
                .inputs()
                .iter()
                .zip(node.primals())
                .map(|(id, primal)| match id {
                    Some(id) => env.get(id).ok_or_else(|| {
                        TensorError::InvalidOperation(format!(
                            "value {} is not available during replay",
                            id.index()
                        ))
                    }),
                    None => Ok(primal),
                })
                .collect::<Result<Vec<&Tensor>, _>>()?;
            trace!("replay {}", node.op().name());
            let output = node.op().forward(&values, &self.options.kernels)?;
            env.insert(node.output_id(), output);
        }
        match &self.output {
            PlanOutput::Value(id) => env.remove(id).ok_or_else(|| {
                TensorError::InvalidOperation("plan output was not produced".to_string())
            }),
            PlanOutput::Constant(value) => Ok(value.clone()),
        }
    }

    /// Evaluate the plan and the gradient of its output with respect to
    /// every input, by recording the replay on a fresh trace.
    pub fn replay_with_gradient(
        &self,
        inputs: &[Tensor],
    ) -> Result<(Tensor, Vec<Tensor>), TensorError> {
        self.check_inputs(inputs)?;
        let trace = Trace::new(self.options.clone());
        let leaves: Vec<TrackedTensor> = inputs.iter().map(|t| trace.leaf(t.clone())).collect();
        let mut env: HashMap<LeafId, TrackedTensor> =
            self.inputs.iter().copied().zip(leaves.iter().cloned()).collect();
        for node in &self.nodes {
            let values = node
                .inputs()
                .iter()
                .zip(node.primals())
                .map(|(id, primal)| match id {
                    Some(id) => env.get(id).cloned().ok_or_else(|| {
                        TensorError::InvalidOperation(format!(
                            "value {} is not available during replay",
                            id.index()
                        ))
                    }),
                    None => Ok(TrackedTensor::constant(primal.clone())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let refs: Vec<&TrackedTensor> = values.iter().collect();
            let output = TrackedTensor::apply(node.op().clone(), &refs)?;
            env.insert(node.output_id(), output);
        }
        let output = match &self.output {
            PlanOutput::Value(id) => env.remove(id).ok_or_else(|| {
                TensorError::InvalidOperation("plan output was not produced".to_string())
            })?,
            PlanOutput::Constant(value) => TrackedTensor::constant(value.clone()),
        };
        let grads = backward(&output)?;
        let gradients = leaves.iter().map(|leaf| grads.of(leaf)).collect();
        Ok((output.into_value(), gradients))
    }
}
