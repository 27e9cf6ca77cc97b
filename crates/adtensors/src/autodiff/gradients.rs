//! Gradient storage container.

use super::tensor::TrackedTensor;
use super::trace::LeafId;
use crate::error::TensorError;
use crate::operations;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// Container for accumulated adjoints.
///
/// Stores adjoints keyed by [`LeafId`], summing contributions for values
/// with more than one downstream use.
#[derive(Debug, Clone, Default)]
pub struct Gradients {
    grads: HashMap<LeafId, Tensor>,
}

impl Gradients {
    /// Create empty gradient container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate an adjoint for a value.
    ///
    /// If one already exists, adds to it (for multiple paths).
    pub fn accumulate(&mut self, id: LeafId, grad: Tensor) -> Result<(), TensorError> {
        match self.grads.get_mut(&id) {
            Some(existing) => *existing = operations::add(existing, &grad)?,
            None => {
                self.grads.insert(id, grad);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: LeafId) -> Option<&Tensor> {
        self.grads.get(&id)
    }

    /// Adjoint of `leaf`, or zeros of its shape when nothing reached it.
    pub fn of(&self, leaf: &TrackedTensor) -> Tensor {
        leaf.id()
            .and_then(|id| self.get(id))
            .cloned()
            .unwrap_or_else(|| Tensor::zeros(leaf.shape()))
    }

    /// Remove and return gradient (for passing to backward functions).
    pub fn remove(&mut self, id: LeafId) -> Option<Tensor> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: LeafId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LeafId, &Tensor)> {
        self.grads.iter()
    }
}
