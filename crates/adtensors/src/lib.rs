//! adtensors - tensors with trace-based automatic differentiation
//!
//! This crate provides immutable n-dimensional `f64` tensors with
//! copy-free views, and reverse- and forward-mode differentiation of
//! functions over arbitrary aggregates of tensors.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Derivative engine (autodiff module)
//!     → primal_and_gradient, reverse_derivative, forward_derivative, trace
//!
//! Level 2: Differentiable operators (autodiff::Op)
//!     → forward rule + vjp + jvp per operator
//!
//! Level 3: Plain operations and kernels (operations, backend modules)
//!     → broadcasting loops, reductions, GEMM through faer
//! ```
//!
//! # Example
//!
//! ```
//! use adtensors::{AxisIndex, Tensor};
//!
//! // Row-major: the last index varies fastest
//! let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
//! assert_eq!(t.get(&[1, 0]).unwrap(), 4.0);
//!
//! // Views share storage with their base
//! let col = t.view_axis(1, AxisIndex::At(2)).unwrap();
//! assert_eq!(col.to_vec(), vec![3.0, 6.0]);
//! assert!(col.shares_storage_with(&t));
//! ```

pub mod autodiff;
pub mod backend;
pub mod error;
pub mod layout;
pub mod operations;
mod random;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use error::TensorError;
pub use layout::{AxisIndex, ViewSpec};
pub use shape::Shape;
pub use tensor::Tensor;
