//! Behavior Tree Engine.
//!
//! A lightweight, composable behavior tree executor hosting the navigation
//! decision nodes.  The host builds a tree once and ticks it from its control
//! loop; every tick walks the composites and calls [`TreeNode::tick`] on the
//! leaves with the shared [`Blackboard`].
//!
//! # Composites
//!
//! | Node type    | Description                                                      |
//! |--------------|------------------------------------------------------------------|
//! | [`Sequence`] | Ticks children left-to-right; fails on first child failure.     |
//! | [`Selector`] | Ticks children left-to-right; succeeds on first child success.  |
//! | [`Leaf`]     | Ticks a [`TreeNode`] and returns its status.                    |
//!
//! [`Sequence`]: BehaviorNode::Sequence
//! [`Selector`]: BehaviorNode::Selector
//! [`Leaf`]: BehaviorNode::Leaf
//!
//! # Example
//!
//! ```rust
//! use navgate_runtime::behavior_tree::{BehaviorNode, NodeStatus};
//! use navgate_runtime::ports::Blackboard;
//!
//! let mut tree = BehaviorNode::sequence(vec![
//!     BehaviorNode::condition("step_a", |_| NodeStatus::Success),
//!     BehaviorNode::condition("step_b", |_| NodeStatus::Success),
//! ]);
//!
//! let mut blackboard = Blackboard::new();
//! assert_eq!(tree.tick(&mut blackboard), NodeStatus::Success);
//! ```

use crate::ports::Blackboard;

// ─────────────────────────────────────────────────────────────────────────────
// NodeStatus
// ─────────────────────────────────────────────────────────────────────────────

/// The execution status returned by a behavior tree node after a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// The node completed its task successfully.
    Success,
    /// The node finished without achieving its task.
    Failure,
    /// The node has started but has not yet finished (long-running actions).
    Running,
}

// ─────────────────────────────────────────────────────────────────────────────
// TreeNode
// ─────────────────────────────────────────────────────────────────────────────

/// A leaf the tree can tick.
///
/// Implementations keep whatever state they need between ticks; the tree only
/// hands them the blackboard.
pub trait TreeNode: Send {
    /// Instance name, used in logs.
    fn name(&self) -> &str;

    /// Advance the node by one tick.
    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus;

    /// Stop any long-running work and return to the idle state.
    fn halt(&mut self) {}
}

/// [`TreeNode`] wrapping a closure, for glue conditions and tests.
struct FnNode<F> {
    name: String,
    action: F,
}

impl<F> TreeNode for FnNode<F>
where
    F: FnMut(&mut Blackboard) -> NodeStatus + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        (self.action)(blackboard)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorNode
// ─────────────────────────────────────────────────────────────────────────────

/// A node in a behavior tree.
///
/// Build trees with [`BehaviorNode::leaf`], [`BehaviorNode::condition`],
/// [`BehaviorNode::sequence`] and [`BehaviorNode::selector`], then call
/// [`BehaviorNode::tick`] to execute.
pub enum BehaviorNode {
    /// Composite: ticks children left-to-right, returns the first status that
    /// is not [`NodeStatus::Success`], or success if all succeed.
    Sequence(Vec<BehaviorNode>),
    /// Composite: ticks children left-to-right, returns the first status that
    /// is not [`NodeStatus::Failure`], or failure if all fail.
    Selector(Vec<BehaviorNode>),
    /// Leaf: a boxed [`TreeNode`].
    Leaf(Box<dyn TreeNode>),
}

impl BehaviorNode {
    /// Wrap a [`TreeNode`] as a leaf.
    pub fn leaf(node: Box<dyn TreeNode>) -> Self {
        BehaviorNode::Leaf(node)
    }

    /// A leaf whose tick is `action`.
    pub fn condition(
        name: impl Into<String>,
        action: impl FnMut(&mut Blackboard) -> NodeStatus + Send + 'static,
    ) -> Self {
        BehaviorNode::Leaf(Box::new(FnNode {
            name: name.into(),
            action,
        }))
    }

    pub fn sequence(children: Vec<BehaviorNode>) -> Self {
        BehaviorNode::Sequence(children)
    }

    pub fn selector(children: Vec<BehaviorNode>) -> Self {
        BehaviorNode::Selector(children)
    }

    /// Tick this node and return the resulting [`NodeStatus`].
    pub fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        match self {
            BehaviorNode::Leaf(node) => node.tick(blackboard),

            BehaviorNode::Sequence(children) => {
                for child in children.iter_mut() {
                    match child.tick(blackboard) {
                        NodeStatus::Success => continue,
                        other => return other,
                    }
                }
                NodeStatus::Success
            }

            BehaviorNode::Selector(children) => {
                for child in children.iter_mut() {
                    match child.tick(blackboard) {
                        NodeStatus::Failure => continue,
                        other => return other,
                    }
                }
                NodeStatus::Failure
            }
        }
    }

    /// Halt every leaf below this node.
    pub fn halt(&mut self) {
        match self {
            BehaviorNode::Leaf(node) => node.halt(),
            BehaviorNode::Sequence(children) | BehaviorNode::Selector(children) => {
                children.iter_mut().for_each(BehaviorNode::halt)
            }
        }
    }

    /// Return the name of this node, if it is a [`BehaviorNode::Leaf`].
    pub fn name(&self) -> Option<&str> {
        match self {
            BehaviorNode::Leaf(node) => Some(node.name()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn always(name: &str, status: NodeStatus) -> BehaviorNode {
        BehaviorNode::condition(name, move |_| status)
    }

    #[test]
    fn leaf_returns_its_status() {
        let mut bb = Blackboard::new();
        assert_eq!(always("ok", NodeStatus::Success).tick(&mut bb), NodeStatus::Success);
        assert_eq!(always("fail", NodeStatus::Failure).tick(&mut bb), NodeStatus::Failure);
        assert_eq!(always("running", NodeStatus::Running).tick(&mut bb), NodeStatus::Running);
    }

    #[test]
    fn sequence_fails_on_first_failure_and_skips_the_rest() {
        let ticked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticked);
        let mut tree = BehaviorNode::sequence(vec![
            always("a", NodeStatus::Success),
            always("b", NodeStatus::Failure),
            BehaviorNode::condition("c", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                NodeStatus::Success
            }),
        ]);
        assert_eq!(tree.tick(&mut Blackboard::new()), NodeStatus::Failure);
        assert_eq!(ticked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sequence_propagates_running() {
        let mut tree = BehaviorNode::sequence(vec![
            always("a", NodeStatus::Success),
            always("b", NodeStatus::Running),
            always("c", NodeStatus::Success),
        ]);
        assert_eq!(tree.tick(&mut Blackboard::new()), NodeStatus::Running);
    }

    #[test]
    fn empty_composites() {
        let mut bb = Blackboard::new();
        assert_eq!(BehaviorNode::sequence(vec![]).tick(&mut bb), NodeStatus::Success);
        assert_eq!(BehaviorNode::selector(vec![]).tick(&mut bb), NodeStatus::Failure);
    }

    #[test]
    fn selector_succeeds_on_first_success() {
        let mut tree = BehaviorNode::selector(vec![
            always("a", NodeStatus::Failure),
            always("b", NodeStatus::Success),
            always("c", NodeStatus::Failure),
        ]);
        assert_eq!(tree.tick(&mut Blackboard::new()), NodeStatus::Success);
    }

    #[test]
    fn leaves_share_the_blackboard() {
        let mut tree = BehaviorNode::sequence(vec![
            BehaviorNode::condition("writer", |bb| {
                bb.set("direction", 1).map_or(NodeStatus::Failure, |_| NodeStatus::Success)
            }),
            BehaviorNode::condition("reader", |bb| match bb.get::<i32>("direction") {
                Ok(Some(1)) => NodeStatus::Success,
                _ => NodeStatus::Failure,
            }),
        ]);
        assert_eq!(tree.tick(&mut Blackboard::new()), NodeStatus::Success);
    }

    struct Halting {
        halted: Arc<AtomicUsize>,
    }

    impl TreeNode for Halting {
        fn name(&self) -> &str {
            "halting"
        }
        fn tick(&mut self, _: &mut Blackboard) -> NodeStatus {
            NodeStatus::Running
        }
        fn halt(&mut self) {
            self.halted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn halt_reaches_nested_leaves() {
        let halted = Arc::new(AtomicUsize::new(0));
        let mut tree = BehaviorNode::selector(vec![
            BehaviorNode::sequence(vec![BehaviorNode::leaf(Box::new(Halting {
                halted: Arc::clone(&halted),
            }))]),
            BehaviorNode::leaf(Box::new(Halting {
                halted: Arc::clone(&halted),
            })),
        ]);
        tree.halt();
        assert_eq!(halted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn leaf_name_is_accessible() {
        assert_eq!(always("my_action", NodeStatus::Success).name(), Some("my_action"));
        assert_eq!(BehaviorNode::sequence(vec![]).name(), None);
    }
}
