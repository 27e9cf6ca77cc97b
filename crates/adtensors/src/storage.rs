//! Shared, immutable element storage.
//!
//! A [`Storage`] is a reference-counted flat buffer. Cloning it, and thus
//! creating a view of a tensor, only bumps the count; the buffer is freed when
//! the last tensor or view holding it is dropped. Since the buffer is never
//! written after construction it can be read from any number of threads.

use std::sync::Arc;

/// Flat row-major buffer shared by a tensor and all of its views.
#[derive(Debug, Clone)]
pub struct Storage {
    data: Arc<[f64]>,
}

impl Storage {
    /// Create storage from existing vector (takes ownership).
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self { data: data.into() }
    }

    /// Zero-initialised storage with `len` elements.
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![0.0; len])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Check if both handles point to the same buffer.
    pub fn shares_storage_with(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Check if other handles to this buffer exist.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }
}
