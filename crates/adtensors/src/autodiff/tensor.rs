//! TrackedTensor - Tensor with trace tracking for automatic differentiation.

use super::op::{CustomOp, Op};
use super::trace::{LeafId, Trace};
use crate::backend::KernelRegistry;
use crate::error::TensorError;
use crate::layout::{AxisIndex, ViewSpec};
use crate::operations::Comparison;
use crate::shape::Shape;
use crate::tensor::Tensor;
use std::sync::Arc;

/// Position of a tracked value in a trace.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub(crate) trace: Trace,
    pub(crate) id: LeafId,
}

impl NodeRef {
    pub fn id(&self) -> LeafId {
        self.id
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

/// A tensor value that may be tracked by a differentiation call.
///
/// This is the leaf type of every differentiable entity. Outside a call it
/// is a constant; the engine swaps in tracked copies while the user function
/// runs. Every operation on a tracked value appends a node to its trace.
///
/// # Example
///
/// ```
/// use adtensors::Tensor;
/// use adtensors::autodiff::{DiffOptions, Trace, TrackedTensor};
///
/// let trace = Trace::new(DiffOptions::default());
/// let x = trace.leaf(Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap());
/// let w = TrackedTensor::from(3.0);
/// let y = x.mul(&w).unwrap().sum().unwrap();
///
/// assert!(y.is_tracked());
/// assert!(!w.is_tracked());
/// assert_eq!(y.value().item().unwrap(), 9.0);
/// assert_eq!(trace.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TrackedTensor {
    value: Tensor,
    node: Option<NodeRef>,
}

impl TrackedTensor {
    /// Wrap a value that takes no part in differentiation.
    pub fn constant(value: Tensor) -> Self {
        Self { value, node: None }
    }

    pub(crate) fn from_node(value: Tensor, node: NodeRef) -> Self {
        Self {
            value,
            node: Some(node),
        }
    }

    /// Primal value.
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn into_value(self) -> Tensor {
        self.value
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    /// Identity within the trace, if tracked.
    pub fn id(&self) -> Option<LeafId> {
        self.node.as_ref().map(|n| n.id)
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.node.as_ref().map(|n| &n.trace)
    }

    pub fn is_tracked(&self) -> bool {
        self.node.is_some()
    }

    pub fn shape(&self) -> &Shape {
        self.value.shape()
    }

    pub fn rank(&self) -> usize {
        self.value.rank()
    }

    pub fn numel(&self) -> usize {
        self.value.numel()
    }

    /// Read one element of the primal value.
    pub fn get(&self, indices: &[usize]) -> Result<f64, TensorError> {
        self.value.get(indices)
    }

    /// Drop tracking, keeping the value.
    pub fn detach(&self) -> Self {
        Self::constant(self.value.clone())
    }

    /// Apply `op` to `inputs`, recording a node when any input is tracked.
    ///
    /// # Errors
    ///
    /// `TraceMismatch` if the tracked inputs come from different traces, and
    /// any error from the operator's forward rule.
    pub(crate) fn apply(op: Op, inputs: &[&TrackedTensor]) -> Result<TrackedTensor, TensorError> {
        let mut trace: Option<&Trace> = None;
        for t in inputs.iter().filter_map(|t| t.trace()) {
            match trace {
                Some(existing) if !existing.same(t) => {
                    return Err(TensorError::TraceMismatch { op: "apply" });
                }
                _ => trace = Some(t),
            }
        }

        let values: Vec<&Tensor> = inputs.iter().map(|t| &t.value).collect();
        let output = match trace {
            Some(trace) => op.forward(&values, &trace.options().kernels)?,
            None => op.forward(&values, &KernelRegistry::empty())?,
        };

        let Some(trace) = trace else {
            return Ok(Self::constant(output));
        };
        let ids = inputs.iter().map(|t| t.id()).collect();
        let primals = values.into_iter().cloned().collect();
        let id = trace.record(op, ids, primals, output.clone());
        Ok(Self::from_node(
            output,
            NodeRef {
                trace: trace.clone(),
                id,
            },
        ))
    }

    /// Apply an externally defined operator.
    pub fn apply_custom(
        op: Arc<dyn CustomOp>,
        inputs: &[&TrackedTensor],
    ) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Custom(op), inputs)
    }

    pub fn add(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Add, &[self, other])
    }

    pub fn sub(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Sub, &[self, other])
    }

    pub fn mul(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Mul, &[self, other])
    }

    pub fn div(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Div, &[self, other])
    }

    pub fn neg(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Neg, &[self])
    }

    pub fn pow(&self, exponent: f64) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Pow(exponent), &[self])
    }

    pub fn exp(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Exp, &[self])
    }

    pub fn ln(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Ln, &[self])
    }

    pub fn sin(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Sin, &[self])
    }

    pub fn cos(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Cos, &[self])
    }

    pub fn relu(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Relu, &[self])
    }

    /// Sum of all elements (rank 0).
    pub fn sum(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Sum, &[self])
    }

    pub fn sum_axis(&self, axis: usize) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::SumAxis(axis), &[self])
    }

    /// Product of two rank-2 tensors.
    pub fn matmul(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Matmul, &[self, other])
    }

    /// Index the leading axes; see [`Tensor::view`].
    pub fn index(&self, indices: &[usize]) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::View(ViewSpec::Index(indices.to_vec())), &[self])
    }

    /// View along one axis; see [`Tensor::view_axis`].
    pub fn view(&self, axis: usize, index: AxisIndex) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::View(ViewSpec::Axis { axis, index }), &[self])
    }

    pub fn transpose(&self) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::View(ViewSpec::Transpose), &[self])
    }

    pub fn permute(&self, perm: &[usize]) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::View(ViewSpec::Permute(perm.to_vec())), &[self])
    }

    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::View(ViewSpec::BroadcastTo(shape.into())), &[self])
    }

    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Reshape(shape.into()), &[self])
    }

    fn compare(&self, other: &TrackedTensor, cmp: Comparison) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Compare(cmp), &[self, other])
    }

    pub fn gt(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        self.compare(other, Comparison::Gt)
    }

    pub fn ge(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        self.compare(other, Comparison::Ge)
    }

    pub fn lt(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        self.compare(other, Comparison::Lt)
    }

    pub fn le(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        self.compare(other, Comparison::Le)
    }

    pub fn eq(&self, other: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        self.compare(other, Comparison::Eq)
    }

    /// Take `a` where `self > 0` and `b` elsewhere.
    ///
    /// Derivatives flow only into the branch chosen at each position.
    pub fn select(&self, a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
        Self::apply(Op::Select, &[self, a, b])
    }
}

impl From<Tensor> for TrackedTensor {
    fn from(value: Tensor) -> Self {
        Self::constant(value)
    }
}

impl From<f64> for TrackedTensor {
    fn from(value: f64) -> Self {
        Self::constant(Tensor::scalar(value))
    }
}
