//! The progress tree and its nodes.

mod root;
pub use root::{Options, Overcommit, UnreservedChild};

mod messages;
pub use messages::{Message, MessageChannel, MessageCopyState};

mod node;
pub use node::{Change, Node, Observer, Snapshot, SubscriptionId};

mod value;

/// The amount of units a node can count.
pub type Step = usize;

/// Identifies a node within its tree.
///
/// Ids are handed out in creation order and are never reused within a tree, but nodes of different trees may share ids.
#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The id every root node has.
    pub const ROOT: NodeId = NodeId(0);

    /// Returns true if this is the id of a root node.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node #{}", self.0)
    }
}
