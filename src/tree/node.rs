use crate::{
    context::CurrentContext,
    tree::{
        root::Tree,
        value::{Child, Value},
        MessageChannel, NodeId, Overcommit, Step, UnreservedChild,
    },
    Error, Result,
};
use dashmap::mapref::one::RefMut;
use std::sync::{atomic::Ordering, Arc};

/// A callback invoked synchronously whenever a node changes, see [`Node::subscribe()`].
pub type Observer = Arc<dyn Fn(&Change) + Send + Sync>;

/// Identifies an [`Observer`] registered with [`Node::subscribe()`].
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct SubscriptionId(usize);

/// A change observable on a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// The fraction of `node` changed to `fraction`, either due to its own counts or due to one of its descendants.
    Fraction {
        /// The node whose fraction changed.
        node: NodeId,
        /// The new fraction, between 0.0 and 1.0.
        fraction: f32,
    },
    /// A message was set on `node` or bubbled up to it. `None` means it was cleared.
    Message {
        /// The node holding the message now.
        node: NodeId,
        /// The channel of the message.
        channel: MessageChannel,
        /// The message itself.
        message: Option<Arc<str>>,
    },
}

/// A copy of the state of a node at some point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// The parent of the node, or `None` if it is a root.
    pub parent: Option<NodeId>,
    /// The amount of units making up this node.
    pub total: Step,
    /// The amount of units completed by the node's own work.
    pub completed: Step,
    /// The fraction of completed work including all children, between 0.0 and 1.0.
    pub fraction: f32,
    /// If true, the node doesn't accept changes anymore.
    pub finished: bool,
    /// The children along with the amount of units they reserved, in order of attachment.
    pub children: Vec<(NodeId, Step)>,
    /// The latest status message set on this node or any of its descendants.
    pub bubbling_message: Option<Arc<str>>,
    /// The latest developer message set on this node or any of its descendants.
    pub developer_bubbling_message: Option<Arc<str>>,
}

impl Snapshot {
    pub(crate) fn new(v: &Value) -> Self {
        Snapshot {
            parent: v.parent,
            total: v.total,
            completed: v.completed,
            fraction: v.fraction,
            finished: v.finished,
            children: v.children.iter().map(|c| (c.id, c.reserved)).collect(),
            bubbling_message: v.bubbling_message.clone(),
            developer_bubbling_message: v.developer_bubbling_message.clone(),
        }
    }
}

type Notifications = Vec<(Observer, Change)>;

/// A `Node` represents one unit of work in the progress tree.
///
/// Its own work is counted in [`completed()`](Node::completed()) units out of [`total()`](Node::total()),
/// minus whatever its children reserved. Each child contributes its own fraction, weighted by the units it reserved.
/// ```rust
/// use weighted_progress::Node;
///
/// let mut root = Node::root(10);
/// let mut child = root.add_child(6, 3)?;
/// root.set_completed(4)?;
/// child.inc()?;
/// assert!((root.fraction() - 0.6).abs() < 1e-6);
///
/// child.complete_progress()?;
/// assert!((root.fraction() - 1.0).abs() < 1e-6);
/// # Ok::<_, weighted_progress::Error>(())
/// ```
///
/// `Node` is a handle: clones refer to the same node, and the tree stays alive as long as any handle to any of
/// its nodes exists. Dropping a handle never detaches its node from its parent.
#[derive(Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) tree: Arc<Tree>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.tree, &other.tree)
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("fraction", &self.fraction())
            .finish()
    }
}

/// Construction
impl Node {
    /// Create a node with `total` units under the current node of `ctx`, consuming its pending unit count.
    ///
    /// If `ctx` is empty, a new tree is created and its root is returned.
    /// If the current node already handed out its pending units, the tree's [`UnreservedChild`] policy applies.
    pub fn new(ctx: &mut CurrentContext, total: Step) -> Result<Node> {
        Self::with_parent(ctx, None, total)
    }

    /// Create a node with `total` units under `parent`, or under the current node of `ctx` if `parent` is `None`.
    ///
    /// The weight of the new node is the pending unit count `parent` declared with
    /// [`become_current()`](Node::become_current()), which is consumed by this call.
    /// Without such a reservation, the tree's [`UnreservedChild`] policy applies.
    pub fn with_parent(ctx: &mut CurrentContext, parent: Option<&Node>, total: Step) -> Result<Node> {
        let (parent, pending) = match parent {
            Some(parent) => (parent.clone(), ctx.pending_for(parent)),
            None => match ctx.current_entry() {
                Some(entry) => entry,
                None => return Ok(Node::root(total)),
            },
        };
        let child = parent.attach(pending, total)?;
        if pending.is_some() {
            ctx.consume(&parent);
        }
        Ok(child)
    }

    /// Adds a new child with `total` units, whose parent is this instance, that stands for `reserved` of our units.
    ///
    /// This does not consider any pending unit count declared with [`become_current()`](Node::become_current()).
    pub fn add_child(&mut self, reserved: Step, total: Step) -> Result<Node> {
        self.attach(Some(reserved), total)
    }

    pub(crate) fn attach(&self, reserved: Option<Step>, total: Step) -> Result<Node> {
        let options = &self.tree.options;
        let reserved = match (reserved, options.unreserved_child) {
            (Some(reserved), _) => reserved,
            (None, UnreservedChild::ZeroWeight) => {
                crate::warn!("{} has no pending units, attaching new child with a weight of 0", self.id);
                0
            }
            (None, UnreservedChild::Reject) => return Err(Error::NoPendingReservation { parent: self.id }),
        };

        let id = NodeId(self.tree.next_id.fetch_add(1, Ordering::Relaxed));
        let child = Value::new(Some(self.id), total);
        let mut notifications = Notifications::new();
        let changed = {
            let mut parent = self.value_mut();
            if parent.finished {
                return Err(Error::Finished { node: self.id });
            }
            let unreserved = parent.unreserved();
            let reserved = if reserved > unreserved {
                match options.overcommit {
                    Overcommit::Reject => {
                        return Err(Error::Overcommitted {
                            parent: self.id,
                            requested: reserved,
                            reserved: parent.reserved(),
                            total: parent.total,
                        })
                    }
                    Overcommit::Clamp => {
                        crate::warn!(
                            "{} can only reserve {} of the {} requested units on {}",
                            id,
                            unreserved,
                            reserved,
                            self.id
                        );
                        unreserved
                    }
                }
            } else {
                reserved
            };
            parent.children.push(Child {
                id,
                reserved,
                fraction: child.fraction,
            });
            fraction_changed(self.id, parent.value_mut(), &mut notifications)
        };
        self.tree.nodes.insert(id, child);
        if let Some((fraction, grand_parent)) = changed {
            propagate(&self.tree, self.id, fraction, grand_parent, &mut notifications);
        }
        notify(notifications);

        Ok(Node {
            id,
            tree: Arc::clone(&self.tree),
        })
    }
}

/// Current context
impl Node {
    /// Make this node the current one in `ctx`, so the next node created through `ctx` becomes our child and stands for
    /// `pending` of our units.
    ///
    /// Each call must be balanced with a call to [`resign_current()`](Node::resign_current()).
    pub fn become_current(&self, ctx: &mut CurrentContext, pending: Step) {
        ctx.push(self.clone(), pending);
    }

    /// Stop being the current node in `ctx`, forgetting a pending unit count that wasn't consumed.
    ///
    /// Fails if this node isn't the current node of `ctx`, leaving `ctx` unchanged.
    pub fn resign_current(&self, ctx: &mut CurrentContext) -> Result<()> {
        ctx.pop(self)
    }
}

/// Counts and completion
impl Node {
    /// Set the amount of units making up this node.
    ///
    /// Setting it to 0 finishes the node along with all of its children.
    pub fn set_total(&mut self, total: Step) -> Result<()> {
        let mut notifications = Notifications::new();
        let changed = {
            let mut v = self.value_mut();
            if v.total == total {
                return Ok(());
            }
            if v.finished {
                return Err(Error::Finished { node: self.id });
            }
            let reserved = v.reserved();
            if total < reserved {
                match self.tree.options.overcommit {
                    Overcommit::Reject => {
                        return Err(Error::TotalBelowReservations {
                            node: self.id,
                            total,
                            reserved,
                        })
                    }
                    Overcommit::Clamp => {
                        crate::warn!("{} now has a total of {} below its {} reserved units", self.id, total, reserved);
                    }
                }
            }
            v.total = total;
            if total == 0 {
                v.completed = 0;
                None
            } else {
                fraction_changed(self.id, v.value_mut(), &mut notifications)
            }
        };
        if total == 0 {
            return self.finish();
        }
        if let Some((fraction, parent)) = changed {
            propagate(&self.tree, self.id, fraction, parent, &mut notifications);
        }
        notify(notifications);
        Ok(())
    }

    /// Set the amount of units completed by this node's own work.
    ///
    /// Units reserved by children are not counted twice: only `total() - reserved` own units contribute to the fraction.
    pub fn set_completed(&mut self, completed: Step) -> Result<()> {
        self.update_completed(|_| completed)
    }

    /// Increment the completed units by `step`.
    pub fn inc_by(&mut self, step: Step) -> Result<()> {
        self.update_completed(|completed| completed.saturating_add(step))
    }

    /// Increment the completed units by 1.
    pub fn inc(&mut self) -> Result<()> {
        self.inc_by(1)
    }

    /// Mark this node and all of its children as 100% completed.
    ///
    /// Calling it again has no effect.
    pub fn complete_progress(&mut self) -> Result<()> {
        self.finish()
    }

    fn update_completed(&self, f: impl FnOnce(Step) -> Step) -> Result<()> {
        let mut notifications = Notifications::new();
        let changed = {
            let mut v = self.value_mut();
            let completed = f(v.completed);
            if v.completed == completed {
                return Ok(());
            }
            if v.total == 0 {
                return Err(Error::ZeroTotal {
                    node: self.id,
                    completed,
                });
            }
            if v.finished {
                return Err(Error::Finished { node: self.id });
            }
            v.completed = completed;
            fraction_changed(self.id, v.value_mut(), &mut notifications)
        };
        if let Some((fraction, parent)) = changed {
            propagate(&self.tree, self.id, fraction, parent, &mut notifications);
        }
        notify(notifications);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let mut notifications = Notifications::new();
        let (fraction, parent) = {
            let mut v = self.value_mut();
            if v.finished {
                return Ok(());
            }
            if v.finish().is_some() {
                notifications.extend(fraction_notifications(self.id, v.value()));
            }
            (v.fraction, v.parent)
        };

        let mut pending = self.children_ids();
        while let Some(id) = pending.pop() {
            if let Some(mut v) = self.tree.nodes.get_mut(&id) {
                if v.finish().is_some() {
                    notifications.extend(fraction_notifications(id, v.value()));
                }
                pending.extend(v.children.iter().map(|c| c.id));
            }
        }

        propagate(&self.tree, self.id, fraction, parent, &mut notifications);
        notify(notifications);
        Ok(())
    }
}

/// Messages
impl Node {
    /// Set `message` on this node and every one of its ancestors, replacing whatever message they had.
    ///
    /// The message is shared among all nodes it bubbles to, not copied.
    pub fn set_bubbling_message(&self, message: impl Into<Arc<str>>) {
        self.bubble(MessageChannel::Status, Some(message.into()))
    }

    /// Clear the message of this node and every one of its ancestors.
    pub fn clear_bubbling_message(&self) {
        self.bubble(MessageChannel::Status, None)
    }

    /// Set a diagnostic `message` on this node and every one of its ancestors.
    ///
    /// It travels just like [`set_bubbling_message()`](Node::set_bubbling_message()), but never affects it.
    pub fn set_developer_bubbling_message(&self, message: impl Into<Arc<str>>) {
        self.bubble(MessageChannel::Developer, Some(message.into()))
    }

    /// Clear the diagnostic message of this node and every one of its ancestors.
    pub fn clear_developer_bubbling_message(&self) {
        self.bubble(MessageChannel::Developer, None)
    }

    fn bubble(&self, channel: MessageChannel, message: Option<Arc<str>>) {
        if let Some(message) = &message {
            match channel {
                MessageChannel::Status => {
                    crate::info!("{} → {}", self.id, message);
                }
                MessageChannel::Developer => {
                    crate::debug!("{} → {}", self.id, message);
                }
            }
            self.tree
                .messages
                .lock()
                .push_overwrite(channel, self.id, Arc::clone(message));
        }

        let mut notifications = Notifications::new();
        let mut next = Some(self.id);
        while let Some(id) = next {
            let mut v = match self.tree.nodes.get_mut(&id) {
                Some(v) => v,
                None => break,
            };
            match channel {
                MessageChannel::Status => v.bubbling_message = message.clone(),
                MessageChannel::Developer => v.developer_bubbling_message = message.clone(),
            }
            notifications.extend(v.observers().into_iter().map(|o| {
                (
                    o,
                    Change::Message {
                        node: id,
                        channel,
                        message: message.clone(),
                    },
                )
            }));
            next = v.parent;
        }
        notify(notifications);
    }
}

/// Observation
impl Node {
    /// Call `observer` synchronously whenever the fraction or one of the messages of this node changes.
    ///
    /// Observers are called after the change was applied to the entire tree, and may thus read from it or change it.
    pub fn subscribe(&self, observer: impl Fn(&Change) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.tree.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.value_mut().observers.push((id, Arc::new(observer)));
        id
    }

    /// Stop calling the observer registered as `id`, returning true if it was registered with this node.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut v = self.value_mut();
        let len = v.observers.len();
        v.observers.retain(|(sid, _)| *sid != id);
        v.observers.len() != len
    }
}

/// Access
impl Node {
    /// Return the identifier of this node within its tree.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Return our parent, or `None` if we are the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.read(|v| v.parent)
    }

    /// Return the amount of units making up this node.
    pub fn total(&self) -> Step {
        self.read(|v| v.total)
    }

    /// Return the amount of units completed by this node's own work.
    pub fn completed(&self) -> Step {
        self.read(|v| v.completed)
    }

    /// Returns a number between `0.0` and `1.0`, the completed fraction of this node including all of its children.
    ///
    /// A node with a total of 0 always returns `1.0`.
    pub fn fraction(&self) -> f32 {
        self.read(|v| v.fraction)
    }

    /// Returns true if the node was completed or has a total of 0.
    pub fn is_finished(&self) -> bool {
        self.read(|v| v.finished)
    }

    /// The latest status message set on this node or one of its descendants.
    pub fn bubbling_message(&self) -> Option<Arc<str>> {
        self.read(|v| v.bubbling_message.clone())
    }

    /// The latest diagnostic message set on this node or one of its descendants.
    pub fn developer_bubbling_message(&self) -> Option<Arc<str>> {
        self.read(|v| v.developer_bubbling_message.clone())
    }

    /// Return our children along with the amount of our units they reserved, in order of attachment.
    pub fn children(&self) -> Vec<(NodeId, Step)> {
        self.read(|v| v.children.iter().map(|c| (c.id, c.reserved)).collect())
    }

    /// Return a copy of our entire state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.value().value())
    }

    fn children_ids(&self) -> Vec<NodeId> {
        self.read(|v| v.children.iter().map(|c| c.id).collect())
    }

    fn read<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        f(self.value().value())
    }

    fn value(&self) -> dashmap::mapref::one::Ref<'_, NodeId, Value> {
        self.tree.nodes.get(&self.id).expect("nodes live as long as their tree")
    }

    fn value_mut(&self) -> RefMut<'_, NodeId, Value> {
        self.tree.nodes.get_mut(&self.id).expect("nodes live as long as their tree")
    }
}

fn fraction_notifications(node: NodeId, v: &Value) -> impl Iterator<Item = (Observer, Change)> {
    let fraction = v.fraction;
    v.observers()
        .into_iter()
        .map(move |o| (o, Change::Fraction { node, fraction }))
}

/// Recompute the fraction of `v`, and if it changed, queue notifications and return the new fraction along with the parent.
fn fraction_changed(node: NodeId, v: &mut Value, out: &mut Notifications) -> Option<(f32, Option<NodeId>)> {
    v.recompute()?;
    out.extend(fraction_notifications(node, v));
    Some((v.fraction, v.parent))
}

/// Tell all ancestors of `child`, starting at `parent`, about its new `fraction`, stopping at the first one
/// whose fraction doesn't change.
fn propagate(tree: &Tree, mut child: NodeId, mut fraction: f32, mut parent: Option<NodeId>, out: &mut Notifications) {
    while let Some(id) = parent {
        let mut v = match tree.nodes.get_mut(&id) {
            Some(v) => v,
            None => break,
        };
        v.update_child(child, fraction);
        match fraction_changed(id, v.value_mut(), out) {
            Some((new_fraction, grand_parent)) => {
                child = id;
                fraction = new_fraction;
                parent = grand_parent;
            }
            None => break,
        }
    }
}

fn notify(notifications: Notifications) {
    for (observer, change) in notifications {
        observer(&change);
    }
}
