use crate::tree::{NodeId, Step};

/// The result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration errors made by the code driving a progress tree.
///
/// None of these are transient, retrying the same call yields the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A child tried to reserve more units than its parent has left.
    #[error("Cannot reserve {requested} units on {parent}: {reserved} of {total} units are already reserved")]
    Overcommitted {
        /// The node that would have been the parent.
        parent: NodeId,
        /// The amount of units the child wanted to reserve.
        requested: Step,
        /// The amount of units already reserved by existing children.
        reserved: Step,
        /// The total units of the parent.
        total: Step,
    },
    /// The total of a node was set below what its children already reserved.
    #[error("Cannot set the total of {node} to {total} as its children reserved {reserved} units")]
    TotalBelowReservations {
        /// The node whose total was changed.
        node: NodeId,
        /// The rejected total.
        total: Step,
        /// The amount of units reserved by its children.
        reserved: Step,
    },
    /// A node with a total of 0 was asked to complete a non-zero amount of units.
    #[error("{node} has a total of 0 units and cannot complete {completed} units")]
    ZeroTotal {
        /// The node in question.
        node: NodeId,
        /// The rejected amount of completed units.
        completed: Step,
    },
    /// A finished node can't change its counts or receive children anymore.
    #[error("{node} is finished")]
    Finished {
        /// The finished node.
        node: NodeId,
    },
    /// `resign_current()` was called while no node was current.
    #[error("Cannot resign {node} as no node is current")]
    EmptyContext {
        /// The node which tried to resign.
        node: NodeId,
    },
    /// `resign_current()` was called on a node that isn't on top of the context.
    #[error("Cannot resign {node} as {current} is current")]
    NotCurrent {
        /// The node which tried to resign.
        node: NodeId,
        /// The node on top of the context.
        current: NodeId,
    },
    /// A child was created for a parent whose pending reservation was already consumed or never made.
    #[error("{parent} has no pending unit count to hand out")]
    NoPendingReservation {
        /// The parent without reservation.
        parent: NodeId,
    },
}
