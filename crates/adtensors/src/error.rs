//! Error types for adtensors.

use crate::shape::Shape;
use thiserror::Error;

/// Errors that can occur in tensor operations and differentiation calls.
///
/// All variants describe model-definition or programmer errors. None of them
/// is transient, so nothing in this crate retries on failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    /// Two shapes are not compatible for the named operation.
    #[error("shape mismatch in {op}: {lhs} is not compatible with {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Index (or range end) outside `0..size` along an axis.
    #[error("index {index} is out of range for axis {axis} with size {size}")]
    IndexOutOfRange {
        index: usize,
        axis: usize,
        size: usize,
    },

    /// More indices than the tensor has dimensions.
    #[error("wrong number of indices: expected at most {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Axis does not exist.
    #[error("axis {axis} does not exist for tensor of rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for tensor with {rank} dimensions")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    /// No derivative rule is registered for an operator.
    #[error("operator `{op}` has no registered derivative rule")]
    UnsupportedOperator { op: String },

    /// A wrap changed the number or order of leaves in an aggregate.
    #[error("wrap changed aggregate structure: expected {expected}, got {actual}")]
    StructuralWrapMismatch { expected: String, actual: String },

    /// Operands were recorded by two different differentiation calls.
    #[error("operands of `{op}` belong to different differentiation calls")]
    TraceMismatch { op: &'static str },

    /// Catch-all for other invalid uses of the API.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl TensorError {
    pub(crate) fn shape_mismatch(
        op: &'static str,
        lhs: impl Into<Shape>,
        rhs: impl Into<Shape>,
    ) -> Self {
        TensorError::ShapeMismatch {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }
}
