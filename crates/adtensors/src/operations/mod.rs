//! Plain tensor operations.
//!
//! These are the primal kernels behind the differentiable operators in
//! [`crate::autodiff`]. They take [`Tensor`](crate::Tensor) values, never
//! record anything, and always return freshly allocated results:
//!
//! ```text
//! TrackedTensor::mul        (records a trace node)
//!     → Op::Mul.forward     (shape checks, kernel dispatch)
//!     → operations::mul     (broadcasting loop)
//! ```

mod elementwise;
mod matmul;
mod predicate;
mod reduce;
mod scatter;

pub use elementwise::{
    add, cos, div, exp, ln, mul, neg, pow, relu, relu_mask, scale, sin, sub, zip_with,
};
pub use matmul::{matmul, matmul_with};
pub use predicate::{Comparison, compare, select};
pub use reduce::{sum, sum_axis, sum_to_shape};
pub use scatter::scatter_view;
