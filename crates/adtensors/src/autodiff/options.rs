//! Per-call configuration.

use crate::backend::KernelRegistry;
use std::sync::Arc;

/// Options for one differentiation call.
///
/// ```
/// use adtensors::autodiff::DiffOptions;
/// use adtensors::backend::KernelRegistry;
///
/// let options = DiffOptions::default()
///     .with_check_structure(true)
///     .with_kernels(KernelRegistry::empty());
/// assert!(options.check_structure);
/// assert!(options.kernels.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Verify that wrapping an input keeps its leaf count and shapes.
    /// On by default in debug builds.
    pub check_structure: bool,
    /// Kernels consulted by operator forward rules.
    pub kernels: Arc<KernelRegistry>,
}

impl DiffOptions {
    pub fn with_check_structure(mut self, check: bool) -> Self {
        self.check_structure = check;
        self
    }

    pub fn with_kernels(mut self, kernels: KernelRegistry) -> Self {
        self.kernels = Arc::new(kernels);
        self
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            check_structure: cfg!(debug_assertions),
            kernels: Arc::new(KernelRegistry::with_defaults()),
        }
    }
}
