use crate::{assert_fraction, init_logging};
use parking_lot::Mutex;
use std::sync::Arc;
use weighted_progress::{
    tree::{Change, Overcommit},
    CurrentContext, Error, Node, NodeId, Options,
};

#[test]
fn thread_safe() {
    fn needs_send_sync<'a, T: Sync + Send + 'a>(_p: T) {}
    let mut root = Node::root(10);
    let child = root.add_child(5, 1).unwrap();
    needs_send_sync(&child);
    needs_send_sync(child);
    needs_send_sync(root);
}

#[test]
fn a_child_of_the_current_node_reserves_the_pending_units() -> weighted_progress::Result<()> {
    init_logging();
    let root = Node::root(100);
    let mut ctx = CurrentContext::new();

    root.become_current(&mut ctx, 40);
    let mut child = Node::new(&mut ctx, 10)?;
    root.resign_current(&mut ctx)?;

    assert_eq!(child.parent(), Some(root.id()));
    assert_eq!(root.children(), vec![(child.id(), 40)]);

    child.set_completed(5)?;
    assert_fraction(&child, 0.5);
    assert_fraction(&root, 0.2);
    Ok(())
}

#[test]
fn own_units_and_children_contribute_by_weight() -> weighted_progress::Result<()> {
    let mut root = Node::root(100);
    let mut a = root.add_child(30, 3)?;
    let mut b = root.add_child(50, 10)?;

    root.set_completed(20)?;
    assert_fraction(&root, 0.2);

    a.inc()?;
    assert_fraction(&root, 0.3);

    b.inc_by(5)?;
    assert_fraction(&root, 0.55);

    root.set_completed(100)?;
    assert_fraction(&root, 0.55);
    assert_eq!(root.completed(), 100, "the value is kept, but only 20 units count");
    Ok(())
}

#[test]
fn changes_cascade_up_to_the_root() -> weighted_progress::Result<()> {
    let mut root = Node::root(10);
    let mut level1 = root.add_child(10, 10)?;
    let mut level2 = level1.add_child(10, 10)?;
    let mut level3 = level2.add_child(10, 4)?;

    level3.set_completed(1)?;
    for node in [&root, &level1, &level2, &level3] {
        assert_fraction(node, 0.25);
    }

    level3.set_completed(4)?;
    assert_fraction(&root, 1.0);
    assert!(!root.is_finished(), "reaching 1.0 isn't the same as completing");
    Ok(())
}

#[test]
fn fractions_stay_within_bounds() -> weighted_progress::Result<()> {
    let mut root = Options {
        overcommit: Overcommit::Clamp,
        ..Options::default()
    }
    .create_root(10);
    let mut children = vec![root.add_child(7, 3)?, root.add_child(7, 0)?, root.add_child(2, 5)?];
    assert_eq!(root.children()[1].1, 3, "only what's left can be reserved");
    assert_eq!(root.children()[2].1, 0);

    let check = |root: &Node| {
        let fraction = root.fraction();
        assert!((0.0..=1.0).contains(&fraction), "{} is out of bounds", fraction);
    };
    for step in 0..12 {
        root.set_completed(step)?;
        check(&root);
        for child in children.iter_mut().filter(|c| !c.is_finished()) {
            child.inc()?;
            check(&root);
        }
    }
    root.set_total(1)?;
    check(&root);
    assert_fraction(&root, 1.0);
    Ok(())
}

#[test]
fn complete_progress_completes_the_subtree_regardless_of_child_state() -> weighted_progress::Result<()> {
    let mut root = Node::root(100);
    let mut stage = root.add_child(50, 10)?;
    let mut leaf = stage.add_child(5, 100)?;
    leaf.set_completed(3)?;

    stage.complete_progress()?;
    assert_fraction(&stage, 1.0);
    assert_fraction(&leaf, 1.0);
    assert_fraction(&root, 0.5);
    assert!(leaf.is_finished());

    assert_eq!(leaf.set_completed(50), Err(Error::Finished { node: leaf.id() }));
    assert_eq!(leaf.set_completed(100), Ok(()), "setting what's already there is fine");
    assert_eq!(
        stage.add_child(0, 1).map(|n| n.id()),
        Err(Error::Finished { node: stage.id() })
    );
    assert_eq!(stage.set_total(20), Err(Error::Finished { node: stage.id() }));
    Ok(())
}

#[test]
fn complete_progress_is_idempotent() -> weighted_progress::Result<()> {
    let mut root = Node::root(8);
    let mut child = root.add_child(4, 2)?;
    child.inc()?;

    root.complete_progress()?;
    let mut once = Vec::new();
    root.sorted_snapshot(&mut once);

    root.complete_progress()?;
    child.complete_progress()?;
    let mut twice = Vec::new();
    root.sorted_snapshot(&mut twice);

    assert_eq!(once, twice);
    assert_fraction(&root, 1.0);
    Ok(())
}

#[test]
fn zero_total_is_always_complete() -> weighted_progress::Result<()> {
    let mut root = Node::root(10);
    let mut empty = root.add_child(4, 0)?;
    assert_fraction(&empty, 1.0);
    assert!(empty.is_finished());
    assert_fraction(&root, 0.4);

    assert_eq!(
        empty.set_completed(1),
        Err(Error::ZeroTotal {
            node: empty.id(),
            completed: 1
        })
    );
    assert_eq!(empty.set_completed(0), Ok(()));
    assert_fraction(&Node::root(0), 1.0);
    Ok(())
}

#[test]
fn reservations_beyond_the_total_are_rejected_by_default() -> weighted_progress::Result<()> {
    let mut root = Node::root(10);
    root.add_child(6, 1)?;
    assert_eq!(
        root.add_child(5, 1).map(|n| n.id()),
        Err(Error::Overcommitted {
            parent: root.id(),
            requested: 5,
            reserved: 6,
            total: 10
        })
    );
    assert_eq!(root.num_nodes(), 2, "the rejected child doesn't exist");
    root.add_child(4, 1)?;
    Ok(())
}

#[test]
fn set_total() -> weighted_progress::Result<()> {
    let mut root = Node::root(10);
    let mut child = root.add_child(6, 2)?;
    child.inc()?;
    assert_fraction(&root, 0.3);

    assert_eq!(
        root.set_total(5),
        Err(Error::TotalBelowReservations {
            node: root.id(),
            total: 5,
            reserved: 6
        })
    );

    root.set_total(20)?;
    assert_fraction(&root, 0.15);

    child.set_total(0)?;
    assert!(child.is_finished());
    assert_eq!(child.completed(), 0);
    assert_fraction(&root, 0.3);
    Ok(())
}

#[test]
fn observers_see_every_fraction_change_along_the_path() -> weighted_progress::Result<()> {
    let mut root = Node::root(100);
    let mut child = root.add_child(40, 10)?;
    let mut sibling = root.add_child(10, 10)?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscription = root.subscribe({
        let seen = Arc::clone(&seen);
        move |change: &Change| seen.lock().push(change.clone())
    });
    child.subscribe({
        let seen = Arc::clone(&seen);
        move |change: &Change| seen.lock().push(change.clone())
    });

    child.set_completed(5)?;
    assert_eq!(
        seen.lock().as_slice(),
        &[
            Change::Fraction {
                node: child.id(),
                fraction: 0.5
            },
            Change::Fraction {
                node: root.id(),
                fraction: 0.2
            }
        ],
        "the child changes first, its ancestors follow"
    );

    seen.lock().clear();
    sibling.set_completed(0)?;
    assert!(seen.lock().is_empty(), "nothing changed, nothing to tell");

    assert!(root.unsubscribe(subscription));
    assert!(!root.unsubscribe(subscription));
    sibling.set_completed(10)?;
    assert!(seen.lock().is_empty());
    Ok(())
}

#[test]
fn observers_may_access_the_tree() -> weighted_progress::Result<()> {
    let mut root = Node::root(2);
    let mut child = root.add_child(2, 2)?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    child.subscribe({
        let seen = Arc::clone(&seen);
        let root = root.clone();
        move |_| seen.lock().push(root.fraction())
    });
    child.inc()?;
    child.complete_progress()?;
    assert_eq!(*seen.lock(), vec![0.5, 1.0], "the change arrived at the root before observers are called");
    Ok(())
}

#[test]
fn sorted_snapshot_lists_parents_before_children() -> weighted_progress::Result<()> {
    let mut root = Node::root(10);
    let mut a = root.add_child(5, 2)?;
    let b = root.add_child(5, 2)?;
    let a1 = a.add_child(1, 1)?;

    let mut out = Vec::new();
    b.sorted_snapshot(&mut out);
    let ids: Vec<_> = out.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![NodeId::ROOT, a.id(), b.id(), a1.id()]);
    assert_eq!(out[3].1.parent, Some(a.id()));
    assert_eq!(out[0].1.children, vec![(a.id(), 5), (b.id(), 5)]);
    assert_eq!(b.tree_root(), root);
    assert_eq!(root.num_nodes(), 4);
    Ok(())
}
