use crate::tree::{node::Observer, NodeId, Step, SubscriptionId};
use std::sync::Arc;

/// A child as seen by its parent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Child {
    pub id: NodeId,
    /// The amount of the parent's units this child stands for.
    pub reserved: Step,
    /// The last fraction the child reported.
    pub fraction: f32,
}

/// The state of one node in the tree.
#[derive(Clone, Default)]
pub(crate) struct Value {
    pub parent: Option<NodeId>,
    pub total: Step,
    pub completed: Step,
    pub children: Vec<Child>,
    pub fraction: f32,
    pub finished: bool,
    pub bubbling_message: Option<Arc<str>>,
    pub developer_bubbling_message: Option<Arc<str>>,
    pub observers: Vec<(SubscriptionId, Observer)>,
}

impl Value {
    pub fn new(parent: Option<NodeId>, total: Step) -> Self {
        let mut v = Value {
            parent,
            total,
            finished: total == 0,
            ..Default::default()
        };
        v.fraction = v.compute_fraction();
        v
    }

    /// The sum of units reserved by all children.
    pub fn reserved(&self) -> Step {
        self.children.iter().map(|c| c.reserved).sum()
    }

    /// The units which are left for children to reserve.
    pub fn unreserved(&self) -> Step {
        self.total.saturating_sub(self.reserved())
    }

    /// Compute the fraction from own work and the weighted fractions of all children.
    ///
    /// Own completed units only count up to the units not reserved by children, and the result
    /// is clamped to `0.0..=1.0` in case reservations were allowed to exceed the total.
    pub fn compute_fraction(&self) -> f32 {
        if self.total == 0 || self.finished {
            return 1.0;
        }
        let own = self.completed.min(self.unreserved()) as f64;
        let children: f64 = self
            .children
            .iter()
            .map(|c| c.reserved as f64 * c.fraction as f64)
            .sum();
        ((own + children) / self.total as f64).clamp(0.0, 1.0) as f32
    }

    /// Recompute the cached fraction and return it if it changed.
    pub fn recompute(&mut self) -> Option<f32> {
        let fraction = self.compute_fraction();
        if fraction == self.fraction {
            return None;
        }
        self.fraction = fraction;
        Some(fraction)
    }

    /// Store the latest `fraction` of the child with `id`, returning false if there is no such child.
    pub fn update_child(&mut self, id: NodeId, fraction: f32) -> bool {
        match self.children.iter_mut().find(|c| c.id == id) {
            Some(child) => {
                child.fraction = fraction;
                true
            }
            None => false,
        }
    }

    /// Mark this node as done, along with what it knows about its children.
    pub fn finish(&mut self) -> Option<f32> {
        self.finished = true;
        self.completed = self.total;
        for child in self.children.iter_mut() {
            child.fraction = 1.0;
        }
        self.recompute()
    }

    pub fn observers(&self) -> Vec<Observer> {
        self.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("parent", &self.parent)
            .field("total", &self.total)
            .field("completed", &self.completed)
            .field("children", &self.children)
            .field("fraction", &self.fraction)
            .field("finished", &self.finished)
            .field("bubbling_message", &self.bubbling_message)
            .field("developer_bubbling_message", &self.developer_bubbling_message)
            .field("observers", &self.observers.len())
            .finish()
    }
}
