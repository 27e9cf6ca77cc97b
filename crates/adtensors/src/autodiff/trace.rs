//! Call-scoped trace of primitive operator applications.
//!
//! A [`Trace`] is created fresh for every differentiation call and threaded
//! through it by the tracked values themselves. There is no global tape:
//! two calls, on the same thread or on different ones, never share a trace
//! or a leaf-identity space.

use super::op::Op;
use super::options::DiffOptions;
use super::tensor::{NodeRef, TrackedTensor};
use crate::tensor::Tensor;
use log::trace;
use std::cell::{Ref, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

/// Identity of a tracked value within one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(usize);

impl LeafId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One recorded operator application.
#[derive(Debug, Clone)]
pub struct TraceNode {
    op: Op,
    inputs: Vec<Option<LeafId>>,
    primals: Vec<Tensor>,
    output: Tensor,
    output_id: LeafId,
}

impl TraceNode {
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Identity of each input; `None` for constants.
    pub fn inputs(&self) -> &[Option<LeafId>] {
        &self.inputs
    }

    /// Captured primal value of each input.
    pub fn primals(&self) -> &[Tensor] {
        &self.primals
    }

    pub fn output(&self) -> &Tensor {
        &self.output
    }

    pub fn output_id(&self) -> LeafId {
        self.output_id
    }
}

#[derive(Default)]
struct TraceState {
    nodes: Vec<TraceNode>,
    next_id: usize,
}

struct TraceInner {
    state: RefCell<TraceState>,
    options: DiffOptions,
}

/// Handle to the trace of one differentiation call.
#[derive(Clone)]
pub struct Trace {
    inner: Rc<TraceInner>,
}

impl Trace {
    pub fn new(options: DiffOptions) -> Self {
        Self {
            inner: Rc::new(TraceInner {
                state: RefCell::new(TraceState::default()),
                options,
            }),
        }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.inner.options
    }

    /// Install `value` as a fresh tracked leaf.
    pub fn leaf(&self, value: Tensor) -> TrackedTensor {
        let id = self.next_id();
        trace!("leaf {} shape {}", id.0, value.shape());
        TrackedTensor::from_node(
            value,
            NodeRef {
                trace: self.clone(),
                id,
            },
        )
    }

    fn next_id(&self) -> LeafId {
        let mut state = self.inner.state.borrow_mut();
        let id = LeafId(state.next_id);
        state.next_id += 1;
        id
    }

    /// Append a node and return the identity of its output.
    pub(crate) fn record(
        &self,
        op: Op,
        inputs: Vec<Option<LeafId>>,
        primals: Vec<Tensor>,
        output: Tensor,
    ) -> LeafId {
        let output_id = self.next_id();
        trace!(
            "record #{} {} {:?} -> {} {}",
            self.len(),
            op.name(),
            inputs,
            output_id.0,
            output.shape()
        );
        self.inner.state.borrow_mut().nodes.push(TraceNode {
            op,
            inputs,
            primals,
            output,
            output_id,
        });
        output_id
    }

    /// Recorded nodes in creation order.
    pub fn nodes(&self) -> Ref<'_, [TraceNode]> {
        Ref::map(self.inner.state.borrow(), |s| s.nodes.as_slice())
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same call's trace.
    pub fn same(&self, other: &Trace) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Trace")
            .field("num_nodes", &state.nodes.len())
            .field("next_id", &state.next_id)
            .finish()
    }
}
