use crate::tree::{
    messages::MessageRingBuffer, value::Value, Message, MessageCopyState, Node, NodeId, Snapshot, Step,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{atomic::AtomicUsize, Arc};

/// The storage shared by all nodes of one tree.
#[derive(Debug)]
pub(crate) struct Tree {
    pub nodes: DashMap<NodeId, Value>,
    pub next_id: AtomicUsize,
    pub next_subscription: AtomicUsize,
    pub messages: Mutex<MessageRingBuffer>,
    pub options: Options,
}

/// What to do if a child wants to reserve more units than its parent has left.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Overcommit {
    /// Fail with [`Error::Overcommitted`](crate::Error::Overcommitted), and refuse to shrink a total below its reservations.
    Reject,
    /// Reserve only what's left, possibly nothing, and allow totals to shrink below their reservations.
    ///
    /// Fractions stay within `0.0..=1.0` either way.
    Clamp,
}

/// What to do if a child is created through a [`CurrentContext`](crate::CurrentContext) whose parent has
/// no pending unit count, usually because a previous child already consumed it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnreservedChild {
    /// Attach the child with a weight of 0. It's part of the tree, but doesn't move its parent's fraction.
    ZeroWeight,
    /// Fail with [`Error::NoPendingReservation`](crate::Error::NoPendingReservation).
    Reject,
}

/// A way to configure new progress trees.
/// ```rust
/// use weighted_progress::{tree::Overcommit, Options};
/// let root = Options::default().create_root(100);
/// let lenient = Options { overcommit: Overcommit::Clamp, ..Options::default() }.create_root(100);
/// # assert_eq!(root.total(), lenient.total());
/// ```
#[derive(Clone, Debug)]
pub struct Options {
    /// The amount of nodes the tree can hold without being forced to allocate
    pub initial_capacity: usize,
    /// The amount of bubbled messages we can hold before we start overwriting old ones
    pub message_buffer_capacity: usize,
    /// How to deal with reservations exceeding a parent's total
    pub overcommit: Overcommit,
    /// How to deal with children created for a parent without pending reservation
    pub unreserved_child: UnreservedChild,
}

impl Options {
    /// Create a new root node with `total` units from the configuration within.
    pub fn create_root(self, total: Step) -> Node {
        let Options {
            initial_capacity,
            message_buffer_capacity,
            ..
        } = self;
        let nodes = DashMap::with_capacity(initial_capacity);
        nodes.insert(NodeId::ROOT, Value::new(None, total));
        Node {
            id: NodeId::ROOT,
            tree: Arc::new(Tree {
                nodes,
                next_id: AtomicUsize::new(NodeId::ROOT.0 + 1),
                next_subscription: AtomicUsize::new(0),
                messages: Mutex::new(MessageRingBuffer::with_capacity(message_buffer_capacity)),
                options: self,
            }),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            initial_capacity: 100,
            message_buffer_capacity: 20,
            overcommit: Overcommit::Reject,
            unreserved_child: UnreservedChild::ZeroWeight,
        }
    }
}

/// Tree-wide access, available from any node of the tree.
impl Node {
    /// Create a new tree with default configuration and return its root, which has `total` units.
    pub fn root(total: Step) -> Node {
        Options::default().create_root(total)
    }

    /// Return the options the tree of this node was created with.
    pub fn options(&self) -> &Options {
        &self.tree.options
    }

    /// Return a handle to the root of this node's tree.
    pub fn tree_root(&self) -> Node {
        Node {
            id: NodeId::ROOT,
            tree: Arc::clone(&self.tree),
        }
    }

    /// Returns the amount of nodes stored in the tree this node belongs to.
    pub fn num_nodes(&self) -> usize {
        self.tree.nodes.len()
    }

    /// Copy the entire tree into the given `out` vector, ordered by [`NodeId`], so parents
    /// always appear before their children.
    pub fn sorted_snapshot(&self, out: &mut Vec<(NodeId, Snapshot)>) {
        out.clear();
        out.extend(self.tree.nodes.iter().map(|r| (*r.key(), Snapshot::new(r.value()))));
        out.sort_by_key(|t| t.0);
    }

    /// Returns the maximum amount of messages we can keep before overwriting older ones.
    pub fn messages_capacity(&self) -> usize {
        self.tree.messages.lock().capacity()
    }

    /// Copy all bubbled messages of the tree into the given `out` vector.
    /// Messages are ordered from oldest to newest.
    pub fn copy_messages(&self, out: &mut Vec<Message>) {
        self.tree.messages.lock().copy_all(out);
    }

    /// Copy only messages bubbled since `prev` was obtained into the given `out` vector.
    /// Messages are ordered from oldest to newest.
    pub fn copy_new_messages(&self, out: &mut Vec<Message>, prev: Option<MessageCopyState>) -> MessageCopyState {
        self.tree.messages.lock().copy_new(out, prev)
    }
}
