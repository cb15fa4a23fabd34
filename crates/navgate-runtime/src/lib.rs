//! `navgate-runtime` – navigation decision nodes.
//!
//! Two behavior tree nodes and the machinery that hosts them.
//!
//! # Modules
//!
//! - [`behavior_tree`] – [`BehaviorNode`][behavior_tree::BehaviorNode]
//!   composites and the [`TreeNode`][behavior_tree::TreeNode] trait every
//!   decision node implements.
//! - [`ports`] – the shared [`Blackboard`][ports::Blackboard] and per-node
//!   [`PortMap`][ports::PortMap] bindings, with `{key}` remapping.
//! - [`goal_resolver`] – [`GoalResolver`][goal_resolver::GoalResolver]:
//!   turns a frame name or raw coordinates into a goal in the world frame.
//! - [`truncation`] – truncated navigation policy templates and the
//!   [`TruncationPolicyGate`][truncation::TruncationPolicyGate] readiness
//!   check.
//! - [`goal_lifecycle`] – [`GoalLifecycle`][goal_lifecycle::GoalLifecycle]:
//!   dispatch, outcome polling and the finish/continue rule, exposed as the
//!   `NavigateTo` node.
//! - [`bearing_gate`] – [`BearingGate`][bearing_gate::BearingGate]: forward
//!   cone check over ranked detections, exposed as the `IsInFront` node.
//! - [`registry`] – static table of node kinds and their construction from
//!   injected collaborators.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing] with optional
//!   OTLP export.

pub mod bearing_gate;
pub mod behavior_tree;
pub mod goal_lifecycle;
pub mod goal_resolver;
pub mod ports;
pub mod registry;
pub mod telemetry;
pub mod truncation;

pub use bearing_gate::{BearingGate, DirectionalVerdict, IsInFront};
pub use behavior_tree::{BehaviorNode, NodeStatus, TreeNode};
pub use goal_lifecycle::{GoalLifecycle, LifecycleState, NavigateConfig, NavigateTo};
pub use goal_resolver::{GoalContext, GoalResolver};
pub use ports::{Blackboard, PortMap};
pub use registry::{BUILTIN_NODES, Collaborators, NodeKind, NodeRegistry};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use truncation::{Readiness, TruncationPolicyGate, TruncationTemplate};
