//! Derivative extraction entry points.
//!
//! Every call runs the same sequence on a fresh [`Trace`]:
//!
//! ```text
//! INIT     wrap the input, installing tracked leaves
//! FORWARD  run the user function once, recording nodes
//! EXTRACT  reverse: replay nodes backwards accumulating adjoints
//!          forward: push tangents through nodes in creation order
//! DONE     drop the trace, return (primal, derivative)
//! ```
//!
//! An error anywhere aborts the call; no partial derivative is returned.
//!
//! # Example
//!
//! ```
//! use adtensors::Tensor;
//! use adtensors::autodiff::{TrackedTensor, primal_and_gradient};
//!
//! // f(w, b) = sum((x * w + b)^2) with x = [1, 2]
//! let x = TrackedTensor::from(Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap());
//! let params = (TrackedTensor::from(1.0), TrackedTensor::from(0.0));
//!
//! let (loss, (dw, db)) = primal_and_gradient(&params, |(w, b)| {
//!     x.mul(w)?.add(b)?.pow(2.0)?.sum()
//! })
//! .unwrap();
//!
//! assert_eq!(loss.item().unwrap(), 5.0);
//! assert_eq!(dw.value().item().unwrap(), 10.0); // 2 * (1 * 1 + 2 * 2)
//! assert_eq!(db.value().item().unwrap(), 6.0); // 2 * (1 + 2)
//! ```

use super::backward::backward_with_seed;
use super::forward::forward;
use super::gradients::Gradients;
use super::options::DiffOptions;
use super::plan::TracePlan;
use super::tensor::TrackedTensor;
use super::trace::{LeafId, Trace};
use super::wrap::{Differentiable, check_leaf_order, check_structure};
use crate::error::TensorError;
use crate::tensor::Tensor;
use log::debug;
use std::collections::HashMap;

/// Runs differentiation calls with a fixed set of [`DiffOptions`].
///
/// The free functions in this module use `Differentiator::default()`.
#[derive(Debug, Clone, Default)]
pub struct Differentiator {
    options: DiffOptions,
}

impl Differentiator {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// INIT: install a fresh tracked leaf for every leaf of `input`.
    fn install<I: Differentiable>(&self, input: &I) -> Result<(Trace, I), TensorError> {
        let trace = Trace::new(self.options.clone());
        let wrapped = input.wrap(&mut |leaf| Ok(trace.leaf(leaf.value().clone())))?;
        if self.options.check_structure {
            check_structure(input, &wrapped)?;
            check_leaf_order(input, &wrapped)?;
        }
        debug!("installed {} leaves", wrapped.leaf_count());
        Ok((trace, wrapped))
    }

    /// FORWARD: evaluate `f` and make sure its output belongs to `trace`.
    fn run<I, F>(&self, trace: &Trace, wrapped: &I, f: F) -> Result<TrackedTensor, TensorError>
    where
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        let output = f(wrapped)?;
        if let Some(other) = output.trace() {
            if !other.same(trace) {
                return Err(TensorError::TraceMismatch { op: "output" });
            }
        }
        debug!(
            "forward recorded {} nodes, output shape {}",
            trace.len(),
            output.shape()
        );
        Ok(output)
    }

    /// Primal output plus a caller-defined extraction of the adjoints.
    ///
    /// `extract` receives the wrapped input (whose leaves carry the identities
    /// the adjoints are keyed by) and the accumulated [`Gradients`].
    ///
    /// # Errors
    ///
    /// Any error raised by `f` or `extract`, `TraceMismatch` if `f` returns a
    /// value tracked by another call, `UnsupportedOperator` if the adjoint has
    /// to cross an operator with no vector-Jacobian rule, and
    /// `StructuralWrapMismatch` if structure checking is on and the input's
    /// wrap is inconsistent.
    pub fn primal_and_reverse_derivative<I, R, F, E>(
        &self,
        input: &I,
        f: F,
        extract: E,
    ) -> Result<(Tensor, R), TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
        E: FnOnce(&I, &Gradients) -> Result<R, TensorError>,
    {
        let (trace, wrapped) = self.install(input)?;
        let output = self.run(&trace, &wrapped, f)?;
        let seed = Tensor::ones(output.shape());
        let grads = backward_with_seed(&output, &seed)?;
        debug!("reverse extraction reached {} values", grads.len());
        let derivative = extract(&wrapped, &grads)?;
        Ok((output.into_value(), derivative))
    }

    /// Primal output and the adjoint of every input leaf, for an explicit
    /// output cotangent.
    pub fn primal_and_vjp<I, F>(
        &self,
        input: &I,
        f: F,
        cotangent: &Tensor,
    ) -> Result<(Tensor, I), TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        let (trace, wrapped) = self.install(input)?;
        let output = self.run(&trace, &wrapped, f)?;
        let grads = backward_with_seed(&output, cotangent)?;
        let derivative = self.gradient_like(&wrapped, &grads)?;
        Ok((output.into_value(), derivative))
    }

    /// Primal output and the gradient, shaped like the input.
    ///
    /// Each leaf of the returned structure holds the adjoint of the
    /// corresponding input leaf; leaves that do not influence the output
    /// get zeros.
    pub fn primal_and_gradient<I, F>(&self, input: &I, f: F) -> Result<(Tensor, I), TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        self.primal_and_reverse_derivative(input, f, |wrapped, grads| {
            self.gradient_like(wrapped, grads)
        })
    }

    /// Gradient only, shaped like the input.
    pub fn reverse_derivative<I, F>(&self, input: &I, f: F) -> Result<I, TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        self.primal_and_gradient(input, f).map(|(_, grad)| grad)
    }

    /// Primal output and its tangent along `direction`.
    ///
    /// `direction` must have the same structure as `input`; its leaves are
    /// the input tangents.
    ///
    /// # Errors
    ///
    /// `StructuralWrapMismatch` if `direction` has a different leaf count or
    /// different leaf shapes than `input`, plus the errors of
    /// [`forward`](crate::autodiff::forward).
    pub fn primal_and_forward_derivative<I, F>(
        &self,
        input: &I,
        direction: &I,
        f: F,
    ) -> Result<(Tensor, Tensor), TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        check_structure(input, direction)?;
        let (trace, wrapped) = self.install(input)?;
        let seeds: HashMap<LeafId, Tensor> = wrapped
            .leaves()
            .into_iter()
            .zip(direction.leaves())
            .filter_map(|(leaf, dir)| leaf.id().map(|id| (id, dir.value().clone())))
            .collect();
        let output = self.run(&trace, &wrapped, f)?;
        let tangent = forward(&output, &seeds)?;
        debug!("forward extraction done, tangent shape {}", tangent.shape());
        Ok((output.into_value(), tangent))
    }

    /// Tangent of the output along `direction`.
    pub fn forward_derivative<I, F>(
        &self,
        input: &I,
        direction: &I,
        f: F,
    ) -> Result<Tensor, TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        self.primal_and_forward_derivative(input, direction, f)
            .map(|(_, tangent)| tangent)
    }

    /// Run `f` once and export the recorded trace as a replayable plan.
    pub fn trace<I, F>(&self, input: &I, f: F) -> Result<TracePlan, TensorError>
    where
        I: Differentiable,
        F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    {
        let (trace, wrapped) = self.install(input)?;
        let output = self.run(&trace, &wrapped, f)?;
        TracePlan::export(&trace, &wrapped, &output)
    }

    /// Rebuild `wrapped` with each leaf replaced by its adjoint.
    fn gradient_like<I: Differentiable>(
        &self,
        wrapped: &I,
        grads: &Gradients,
    ) -> Result<I, TensorError> {
        let gradient = wrapped.wrap(&mut |leaf| Ok(TrackedTensor::constant(grads.of(leaf))))?;
        if self.options.check_structure {
            check_structure(wrapped, &gradient)?;
        }
        Ok(gradient)
    }
}

/// [`Differentiator::primal_and_reverse_derivative`] with default options.
pub fn primal_and_reverse_derivative<I, R, F, E>(
    input: &I,
    f: F,
    extract: E,
) -> Result<(Tensor, R), TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
    E: FnOnce(&I, &Gradients) -> Result<R, TensorError>,
{
    Differentiator::default().primal_and_reverse_derivative(input, f, extract)
}

/// [`Differentiator::reverse_derivative`] with default options.
pub fn reverse_derivative<I, F>(input: &I, f: F) -> Result<I, TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().reverse_derivative(input, f)
}

/// [`Differentiator::primal_and_gradient`] with default options.
pub fn primal_and_gradient<I, F>(input: &I, f: F) -> Result<(Tensor, I), TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().primal_and_gradient(input, f)
}

/// [`Differentiator::primal_and_vjp`] with default options.
pub fn primal_and_vjp<I, F>(input: &I, f: F, cotangent: &Tensor) -> Result<(Tensor, I), TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().primal_and_vjp(input, f, cotangent)
}

/// [`Differentiator::primal_and_forward_derivative`] with default options.
pub fn primal_and_forward_derivative<I, F>(
    input: &I,
    direction: &I,
    f: F,
) -> Result<(Tensor, Tensor), TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().primal_and_forward_derivative(input, direction, f)
}

/// [`Differentiator::forward_derivative`] with default options.
pub fn forward_derivative<I, F>(input: &I, direction: &I, f: F) -> Result<Tensor, TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().forward_derivative(input, direction, f)
}

/// [`Differentiator::trace`] with default options.
pub fn trace<I, F>(input: &I, f: F) -> Result<TracePlan, TensorError>
where
    I: Differentiable,
    F: FnOnce(&I) -> Result<TrackedTensor, TensorError>,
{
    Differentiator::default().trace(input, f)
}
