#![deny(unsafe_code, missing_docs)]
/*!
Weighted-progress is a tree of progress nodes which compose many independent units of work into a single,
continuously updated completion fraction and status message.

It consists of two parts

* a [`Node`] tree, in which every node has a total and a completed unit count and reserves a portion of its total
  for each of its children. Setting counts anywhere recomputes the fraction of every ancestor up to the root.
* a [`CurrentContext`], a stack of `(node, pending unit count)` entries which lets a newly created node find its parent
  without being handed a reference to it.

```rust
use weighted_progress::{CurrentContext, Node};

let root = Node::root(100);
let mut ctx = CurrentContext::new();

root.become_current(&mut ctx, 40);
let mut download = Node::new(&mut ctx, 10)?;
root.resign_current(&mut ctx)?;

download.set_completed(5)?;
download.set_bubbling_message("downloading index");

assert!((root.fraction() - 0.2).abs() < f32::EPSILON);
assert_eq!(root.bubbling_message().as_deref(), Some("downloading index"));
# Ok::<_, weighted_progress::Error>(())
```

# Observation

Nodes don't render anything. Use [`Node::subscribe()`] to be called synchronously whenever a node's fraction or
one of its messages changes, or read state at any time with [`Node::fraction()`] and [`Node::sorted_snapshot()`].
Every bubbled message is also kept in a bounded ring buffer per tree, see [`Node::copy_new_messages()`].

# Logging

If the feature `progress-tree-log` is enabled (default), bubbled messages and policy decisions are logged
through the `log` crate.
*/
pub mod context;
mod error;
pub mod tree;

pub use context::{with_current, CurrentContext};
pub use error::{Error, Result};
pub use tree::{Node, NodeId, Options, Step};

#[cfg(feature = "progress-tree-log")]
#[doc(hidden)]
pub use log::{debug, info, warn};

#[cfg(not(feature = "progress-tree-log"))]
mod log {
    /// Stub
    #[macro_export(local_inner_macros)]
    #[doc(hidden)]
    macro_rules! warn {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }
    /// Stub
    #[macro_export(local_inner_macros)]
    #[doc(hidden)]
    macro_rules! info {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }
    /// Stub
    #[macro_export(local_inner_macros)]
    #[doc(hidden)]
    macro_rules! debug {
        (target: $target:expr, $($arg:tt)+) => {};
        ($($arg:tt)+) => {};
    }
}
