//! Differentiable operators.
//!
//! [`Op`] is the closed set of primitives the trace knows about. Each variant
//! carries a forward rule plus its local derivative rules: a vector-Jacobian
//! product for reverse mode and a Jacobian-vector product for forward mode.
//! Rules only see the node's own captured inputs and output.
//!
//! Operators outside this set join through [`CustomOp`].

use crate::backend::KernelRegistry;
use crate::error::TensorError;
use crate::layout::ViewSpec;
use crate::operations::{self, Comparison};
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::debug;
use std::fmt::Debug;
use std::sync::Arc;

/// An operator defined outside this crate, such as an accelerated kernel.
///
/// Only `forward` is required. A missing derivative rule surfaces as
/// `TensorError::UnsupportedOperator` when a derivative actually has to flow
/// through the node.
pub trait CustomOp: Debug + Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    fn forward(&self, inputs: &[&Tensor]) -> Result<Tensor, TensorError>;

    /// Adjoint of every input, given the adjoint of the output.
    fn vjp(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        _adjoint: &Tensor,
    ) -> Result<Vec<Tensor>, TensorError> {
        Err(TensorError::UnsupportedOperator {
            op: self.name().to_string(),
        })
    }

    /// Tangent of the output given input tangents (`None` means zero).
    fn jvp(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        _tangents: &[Option<Tensor>],
    ) -> Result<Tensor, TensorError> {
        Err(TensorError::UnsupportedOperator {
            op: self.name().to_string(),
        })
    }
}

/// A primitive operator recorded in a trace.
#[derive(Debug, Clone)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    /// Constant exponent.
    Pow(f64),
    Exp,
    Ln,
    Sin,
    Cos,
    Relu,
    /// Sum of all elements.
    Sum,
    SumAxis(usize),
    Matmul,
    /// Index, axis view, permutation, transpose or broadcast.
    View(ViewSpec),
    Reshape(Shape),
    Compare(Comparison),
    /// `select(cond, a, b)`.
    Select,
    Custom(Arc<dyn CustomOp>),
}

impl Op {
    pub fn name(&self) -> &str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Neg => "neg",
            Op::Pow(_) => "pow",
            Op::Exp => "exp",
            Op::Ln => "ln",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Relu => "relu",
            Op::Sum => "sum",
            Op::SumAxis(_) => "sum_axis",
            Op::Matmul => "matmul",
            Op::View(ViewSpec::Index(_)) => "index",
            Op::View(ViewSpec::Axis { .. }) => "view",
            Op::View(ViewSpec::Permute(_)) => "permute",
            Op::View(ViewSpec::Transpose) => "transpose",
            Op::View(ViewSpec::BroadcastTo(_)) => "broadcast_to",
            Op::Reshape(_) => "reshape",
            Op::Compare(cmp) => cmp.name(),
            Op::Select => "select",
            Op::Custom(op) => op.name(),
        }
    }

    /// Number of inputs, or `None` for custom operators.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Matmul | Op::Compare(_) => Some(2),
            Op::Select => Some(3),
            Op::Custom(_) => None,
            _ => Some(1),
        }
    }

    fn check_arity(&self, n: usize) -> Result<(), TensorError> {
        match self.arity() {
            Some(expected) if expected != n => Err(TensorError::InvalidOperation(format!(
                "{} expects {expected} inputs, got {n}",
                self.name()
            ))),
            _ => Ok(()),
        }
    }

    /// Evaluate the operator on primal values.
    pub fn forward(
        &self,
        inputs: &[&Tensor],
        kernels: &KernelRegistry,
    ) -> Result<Tensor, TensorError> {
        self.check_arity(inputs.len())?;
        match self {
            Op::Add => operations::add(inputs[0], inputs[1]),
            Op::Sub => operations::sub(inputs[0], inputs[1]),
            Op::Mul => operations::mul(inputs[0], inputs[1]),
            Op::Div => operations::div(inputs[0], inputs[1]),
            Op::Neg => Ok(operations::neg(inputs[0])),
            Op::Pow(p) => Ok(operations::pow(inputs[0], *p)),
            Op::Exp => Ok(operations::exp(inputs[0])),
            Op::Ln => Ok(operations::ln(inputs[0])),
            Op::Sin => Ok(operations::sin(inputs[0])),
            Op::Cos => Ok(operations::cos(inputs[0])),
            Op::Relu => Ok(operations::relu(inputs[0])),
            Op::Sum => Ok(operations::sum(inputs[0])),
            Op::SumAxis(axis) => operations::sum_axis(inputs[0], *axis),
            Op::Matmul => operations::matmul_with(inputs[0], inputs[1], kernels),
            Op::View(spec) => inputs[0].apply_view(spec),
            Op::Reshape(shape) => inputs[0].reshape(shape),
            Op::Compare(cmp) => operations::compare(inputs[0], inputs[1], *cmp),
            Op::Select => operations::select(inputs[0], inputs[1], inputs[2]),
            Op::Custom(op) => op.forward(inputs),
        }
    }

    /// Vector-Jacobian product: the adjoint contribution of each input.
    ///
    /// `None` marks an input that receives no contribution.
    pub fn vjp(
        &self,
        inputs: &[Tensor],
        output: &Tensor,
        adjoint: &Tensor,
        kernels: &KernelRegistry,
    ) -> Result<Vec<Option<Tensor>>, TensorError> {
        self.check_arity(inputs.len())?;
        let reduce = |t: Tensor, i: usize| operations::sum_to_shape(&t, inputs[i].shape());
        let grads = match self {
            Op::Add => vec![
                Some(reduce(adjoint.clone(), 0)?),
                Some(reduce(adjoint.clone(), 1)?),
            ],
            Op::Sub => vec![
                Some(reduce(adjoint.clone(), 0)?),
                Some(reduce(operations::neg(adjoint), 1)?),
            ],
            Op::Mul => vec![
                Some(reduce(operations::mul(adjoint, &inputs[1])?, 0)?),
                Some(reduce(operations::mul(adjoint, &inputs[0])?, 1)?),
            ],
            Op::Div => {
                // d(a/b)/db = -(a/b)/b
                let da = operations::div(adjoint, &inputs[1])?;
                let db = operations::neg(&operations::mul(&da, output)?);
                vec![Some(reduce(da, 0)?), Some(reduce(db, 1)?)]
            }
            Op::Neg => vec![Some(operations::neg(adjoint))],
            Op::Pow(p) => vec![Some(operations::mul(adjoint, &pow_derivative(&inputs[0], *p))?)],
            Op::Exp => vec![Some(operations::mul(adjoint, output)?)],
            Op::Ln => vec![Some(operations::div(adjoint, &inputs[0])?)],
            Op::Sin => vec![Some(operations::mul(adjoint, &operations::cos(&inputs[0]))?)],
            Op::Cos => vec![Some(operations::neg(&operations::mul(
                adjoint,
                &operations::sin(&inputs[0]),
            )?))],
            Op::Relu => vec![Some(operations::mul(
                adjoint,
                &operations::relu_mask(&inputs[0]),
            )?)],
            Op::Sum => vec![Some(adjoint.broadcast_to(inputs[0].shape())?.contiguous())],
            Op::SumAxis(axis) => {
                let kept = inputs[0].shape().without_axis(*axis).with_unit_axis(*axis);
                let spread = adjoint.reshape(kept)?.broadcast_to(inputs[0].shape())?;
                vec![Some(spread.contiguous())]
            }
            Op::Matmul => {
                let da = operations::matmul_with(adjoint, &inputs[1].transpose(), kernels)?;
                let db = operations::matmul_with(&inputs[0].transpose(), adjoint, kernels)?;
                vec![Some(da), Some(db)]
            }
            Op::View(spec) => vec![Some(operations::scatter_view(
                adjoint,
                inputs[0].shape(),
                spec,
            )?)],
            Op::Reshape(_) => vec![Some(adjoint.reshape(inputs[0].shape())?)],
            Op::Compare(_) => vec![None, None],
            Op::Select => {
                let zero = Tensor::scalar(0.0);
                let cond = &inputs[0];
                vec![
                    None,
                    Some(reduce(operations::select(cond, adjoint, &zero)?, 1)?),
                    Some(reduce(operations::select(cond, &zero, adjoint)?, 2)?),
                ]
            }
            Op::Custom(op) => {
                let grads = op.vjp(inputs, output, adjoint)?;
                if grads.len() != inputs.len() {
                    return Err(TensorError::InvalidOperation(format!(
                        "vjp of {} returned {} adjoints for {} inputs",
                        op.name(),
                        grads.len(),
                        inputs.len()
                    )));
                }
                for (grad, input) in grads.iter().zip(inputs) {
                    if grad.shape() != input.shape() {
                        debug!("vjp of {} returned a mis-shaped adjoint", op.name());
                        return Err(TensorError::shape_mismatch(
                            "custom vjp",
                            input.shape(),
                            grad.shape(),
                        ));
                    }
                }
                grads.into_iter().map(Some).collect()
            }
        };
        Ok(grads)
    }

    /// Jacobian-vector product: the tangent of the output.
    ///
    /// Input tangents of `None` are zero. Returns `None` when the output
    /// tangent is zero.
    pub fn jvp(
        &self,
        inputs: &[Tensor],
        output: &Tensor,
        tangents: &[Option<Tensor>],
        kernels: &KernelRegistry,
    ) -> Result<Option<Tensor>, TensorError> {
        self.check_arity(inputs.len())?;
        if tangents.iter().all(Option::is_none) {
            return Ok(None);
        }
        let t = |i: usize| tangents.get(i).and_then(Option::as_ref);
        let mut terms: Vec<Tensor> = Vec::with_capacity(2);
        match self {
            Op::Add => terms.extend(t(0).cloned().into_iter().chain(t(1).cloned())),
            Op::Sub => {
                terms.extend(t(0).cloned());
                terms.extend(t(1).map(operations::neg));
            }
            Op::Mul => {
                if let Some(ta) = t(0) {
                    terms.push(operations::mul(ta, &inputs[1])?);
                }
                if let Some(tb) = t(1) {
                    terms.push(operations::mul(&inputs[0], tb)?);
                }
            }
            Op::Div => {
                if let Some(ta) = t(0) {
                    terms.push(operations::div(ta, &inputs[1])?);
                }
                if let Some(tb) = t(1) {
                    let q = operations::div(&operations::mul(output, tb)?, &inputs[1])?;
                    terms.push(operations::neg(&q));
                }
            }
            Op::Custom(op) => {
                let tangent = op.jvp(inputs, output, tangents)?;
                if tangent.shape() != output.shape() {
                    debug!("jvp of {} returned a mis-shaped tangent", op.name());
                    return Err(TensorError::shape_mismatch(
                        "custom jvp",
                        output.shape(),
                        tangent.shape(),
                    ));
                }
                terms.push(tangent);
            }
            Op::Compare(_) => return Ok(None),
            Op::Select => {
                let zero = Tensor::scalar(0.0);
                let ta = t(1).unwrap_or(&zero);
                let tb = t(2).unwrap_or(&zero);
                if t(1).is_none() && t(2).is_none() {
                    return Ok(None);
                }
                terms.push(operations::select(&inputs[0], ta, tb)?);
            }
            Op::Matmul => {
                let zero_a;
                let ta = match t(0) {
                    Some(ta) => ta,
                    None => {
                        zero_a = Tensor::zeros(inputs[0].shape());
                        &zero_a
                    }
                };
                let mut tangent = operations::matmul_with(ta, &inputs[1], kernels)?;
                if let Some(tb) = t(1) {
                    tangent = operations::add(
                        &tangent,
                        &operations::matmul_with(&inputs[0], tb, kernels)?,
                    )?;
                }
                terms.push(tangent);
            }
            unary => {
                let Some(tx) = t(0) else {
                    return Ok(None);
                };
                let x = &inputs[0];
                let tangent = match unary {
                    Op::Neg => operations::neg(tx),
                    Op::Pow(p) => operations::mul(tx, &pow_derivative(x, *p))?,
                    Op::Exp => operations::mul(tx, output)?,
                    Op::Ln => operations::div(tx, x)?,
                    Op::Sin => operations::mul(tx, &operations::cos(x))?,
                    Op::Cos => operations::neg(&operations::mul(tx, &operations::sin(x))?),
                    Op::Relu => operations::mul(tx, &operations::relu_mask(x))?,
                    Op::Sum => operations::sum(tx),
                    Op::SumAxis(axis) => operations::sum_axis(tx, *axis)?,
                    Op::View(spec) => tx.apply_view(spec)?,
                    Op::Reshape(shape) => tx.reshape(shape)?,
                    _ => {
                        return Err(TensorError::UnsupportedOperator {
                            op: self.name().to_string(),
                        });
                    }
                };
                terms.push(tangent);
            }
        }

        let mut terms = terms.into_iter();
        let Some(mut tangent) = terms.next() else {
            return Ok(None);
        };
        for term in terms {
            tangent = operations::add(&tangent, &term)?;
        }
        if tangent.shape() != output.shape() {
            tangent = tangent.broadcast_to(output.shape())?.contiguous();
        }
        Ok(Some(tangent))
    }
}

/// `p * x^(p - 1)`, with the `p == 0` case pinned to zero.
fn pow_derivative(x: &Tensor, p: f64) -> Tensor {
    if p == 0.0 {
        Tensor::zeros(x.shape())
    } else {
        operations::scale(&operations::pow(x, p - 1.0), p)
    }
}
