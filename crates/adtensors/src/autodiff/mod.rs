//! Automatic differentiation over tensors.
//!
//! This module provides trace-based reverse mode and forward mode for
//! functions of arbitrary [`Differentiable`] aggregates.
//!
//! # Architecture
//!
//! ```text
//! Differentiable input ──wrap──► TrackedTensor leaves ──ops──► Trace (per call)
//!                                                               │
//!                                 Op::vjp (reverse order) ◄─────┤
//!                                 Op::jvp (creation order) ◄────┘
//! ```
//!
//! # Example
//!
//! ```
//! use adtensors::{Tensor, differentiable};
//! use adtensors::autodiff::{TrackedTensor, reverse_derivative};
//!
//! #[derive(Debug, Clone)]
//! struct Line {
//!     w: TrackedTensor,
//!     b: TrackedTensor,
//! }
//!
//! differentiable!(Line { w, b });
//!
//! let x = TrackedTensor::from(Tensor::from_vec(vec![0.0, 1.0, 2.0], [3]).unwrap());
//! let y = TrackedTensor::from(Tensor::from_vec(vec![2.0, 7.0, 12.0], [3]).unwrap());
//! let line = Line { w: TrackedTensor::from(5.0), b: TrackedTensor::from(2.0) };
//!
//! // squared error of an exact fit has zero gradient
//! let grad = reverse_derivative(&line, |m| {
//!     y.sub(&x.mul(&m.w)?.add(&m.b)?)?.pow(2.0)?.sum()
//! })
//! .unwrap();
//! assert_eq!(grad.w.value().item().unwrap(), 0.0);
//! assert_eq!(grad.b.value().item().unwrap(), 0.0);
//! ```
//!
//! # Key Types
//!
//! - [`TrackedTensor`]: leaf and intermediate value, tracked or constant
//! - [`Differentiable`]: structural wrap protocol for aggregates
//! - [`Differentiator`]: entry points, configured by [`DiffOptions`]
//! - [`TracePlan`]: exported trace for external replay
//!
//! # Design Notes
//!
//! - The trace is created per call and reached through the tracked values
//!   (`Rc`), never through global or thread-local state
//! - Adjoints are summed for values with several uses

mod backward;
mod engine;
mod forward;
mod gradients;
mod op;
mod options;
mod plan;
mod tensor;
mod trace;
mod wrap;

pub use backward::{backward, backward_with_seed};
pub use engine::{
    Differentiator, forward_derivative, primal_and_forward_derivative, primal_and_gradient,
    primal_and_reverse_derivative, primal_and_vjp, reverse_derivative, trace,
};
pub use forward::forward;
pub use gradients::Gradients;
pub use op::{CustomOp, Op};
pub use options::DiffOptions;
pub use plan::{ShapeSignature, TracePlan};
pub use tensor::{NodeRef, TrackedTensor};
pub use trace::{LeafId, Trace, TraceNode};
pub use wrap::{Differentiable, WrapFn, check_structure};
