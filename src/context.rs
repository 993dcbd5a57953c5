//! The stack of current nodes, which lets nodes find their parent without being handed a reference to it.
//!
//! A [`CurrentContext`] is a plain value: pass it explicitly to [`Node::new()`] and friends. For code that
//! can't thread it through, every thread has one of its own, reachable through [`with_current()`].
//!
//! ```rust
//! use weighted_progress::{with_current, Node};
//!
//! fn fetch_index() -> weighted_progress::Result<()> {
//!     let mut progress = with_current(|ctx| Node::new(ctx, 3))?;
//!     for _ in 0..3 {
//!         progress.inc()?;
//!     }
//!     Ok(())
//! }
//!
//! let root = Node::root(10);
//! with_current(|ctx| root.become_current(ctx, 10));
//! fetch_index()?;
//! with_current(|ctx| root.resign_current(ctx))?;
//! assert_eq!(root.fraction(), 1.0);
//! # Ok::<_, weighted_progress::Error>(())
//! ```
use crate::{
    tree::{Node, Step},
    Error, Result,
};
use std::cell::RefCell;

thread_local! {
    static CURRENT: RefCell<CurrentContext> = RefCell::new(CurrentContext::new());
}

/// Run `f` with the context of the calling thread.
///
/// Contexts of different threads are independent, so unrelated work on other threads never attaches to our nodes.
///
/// # Panics
///
/// If called from within `f`, as the context is borrowed mutably for the duration of the call.
pub fn with_current<T>(f: impl FnOnce(&mut CurrentContext) -> T) -> T {
    CURRENT.with(|ctx| f(&mut *ctx.borrow_mut()))
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    /// Units the next child created through the context will reserve, or `None` once consumed.
    pending: Option<Step>,
}

/// A stack of nodes which became current along with the units their next child should reserve.
///
/// The topmost node is the current one. It is pushed by [`Node::become_current()`] and popped by
/// [`Node::resign_current()`], and calls to both must be balanced.
#[derive(Debug, Clone, Default)]
pub struct CurrentContext {
    stack: Vec<Entry>,
}

impl CurrentContext {
    /// Create an empty context, in which new nodes become roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current node, if any.
    pub fn current(&self) -> Option<&Node> {
        self.stack.last().map(|e| &e.node)
    }

    /// Return the units the next child of the current node will reserve, or `None` if there is no current node
    /// or it already handed out its units.
    pub fn pending(&self) -> Option<Step> {
        self.stack.last().and_then(|e| e.pending)
    }

    /// Return the amount of nodes which are current, i.e. the amount of unbalanced `become_current()` calls.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if no node is current.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn push(&mut self, node: Node, pending: Step) {
        self.stack.push(Entry {
            node,
            pending: Some(pending),
        });
    }

    pub(crate) fn pop(&mut self, node: &Node) -> Result<()> {
        match self.stack.last() {
            None => Err(Error::EmptyContext { node: node.id() }),
            Some(top) if top.node != *node => Err(Error::NotCurrent {
                node: node.id(),
                current: top.node.id(),
            }),
            Some(_) => {
                self.stack.pop();
                Ok(())
            }
        }
    }

    pub(crate) fn current_entry(&self) -> Option<(Node, Option<Step>)> {
        self.stack.last().map(|e| (e.node.clone(), e.pending))
    }

    /// The pending units of the topmost entry of `node` which still has some.
    pub(crate) fn pending_for(&self, node: &Node) -> Option<Step> {
        self.stack
            .iter()
            .rev()
            .filter(|e| e.node == *node)
            .find_map(|e| e.pending)
    }

    pub(crate) fn consume(&mut self, node: &Node) {
        if let Some(entry) = self
            .stack
            .iter_mut()
            .rev()
            .find(|e| e.node == *node && e.pending.is_some())
        {
            entry.pending = None;
        }
    }
}
