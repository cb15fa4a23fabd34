//! Node registry.
//!
//! The decision nodes this crate provides are listed in [`BUILTIN_NODES`], a
//! static table mapping the type names used in tree descriptions to a
//! [`NodeKind`].  [`NodeRegistry::build`] constructs a node from that table,
//! wiring in the collaborators it needs from a [`Collaborators`] bundle.
//!
//! ```rust
//! use navgate_runtime::registry::{NodeKind, NodeRegistry};
//! use navgate_runtime::goal_lifecycle::NavigateConfig;
//!
//! let registry = NodeRegistry::new(NavigateConfig::default());
//! assert_eq!(registry.kind_of("IsInFront"), Some(NodeKind::DirectionalGate));
//! assert_eq!(registry.kind_of("Wander"), None);
//! ```

use std::sync::Arc;

use navgate_middleware::{ActionClient, ConfigService};
use navgate_perception::{DetectionService, FrameLookup};
use navgate_types::NavError;
use tracing::info;

use crate::bearing_gate::IsInFront;
use crate::behavior_tree::TreeNode;
use crate::goal_lifecycle::{GoalLifecycle, NavigateConfig, NavigateTo};
use crate::ports::{Blackboard, PortMap};

/// The kinds of node this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Resolves, dispatches and follows up a navigation goal.
    GoalDecision,
    /// Passes when the target entity lies in the forward cone.
    DirectionalGate,
}

/// Type names accepted by [`NodeRegistry::build`].
pub static BUILTIN_NODES: &[(&str, NodeKind)] = &[
    ("NavigateTo", NodeKind::GoalDecision),
    ("IsInFront", NodeKind::DirectionalGate),
];

/// External collaborators handed to the nodes.
pub struct Collaborators {
    pub frames: Arc<dyn FrameLookup>,
    pub config_service: Arc<dyn ConfigService>,
    /// Taken by the first goal-decision node built from this bundle.
    pub action_client: Option<Box<dyn ActionClient>>,
    pub detections: Arc<dyn DetectionService>,
}

/// Builds nodes from [`BUILTIN_NODES`].
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    config: NavigateConfig,
}

impl NodeRegistry {
    pub fn new(config: NavigateConfig) -> Self {
        Self { config }
    }

    pub fn kind_of(&self, type_name: &str) -> Option<NodeKind> {
        BUILTIN_NODES
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, kind)| *kind)
    }

    /// Build node `type_name` as `instance_name`.
    ///
    /// # Errors
    ///
    /// - [`NavError::UnknownNodeType`] – `type_name` is not in
    ///   [`BUILTIN_NODES`].
    /// - [`NavError::Config`] – a `NavigateTo` was requested but the bundle's
    ///   action client has already been taken.
    pub fn build(
        &self,
        type_name: &str,
        instance_name: &str,
        ports: PortMap,
        collaborators: &mut Collaborators,
        blackboard: &Blackboard,
    ) -> Result<Box<dyn TreeNode>, NavError> {
        let kind = self
            .kind_of(type_name)
            .ok_or_else(|| NavError::UnknownNodeType(type_name.to_string()))?;
        info!(node = instance_name, node_type = type_name, "building node");

        match kind {
            NodeKind::GoalDecision => {
                let client = collaborators.action_client.take().ok_or_else(|| {
                    NavError::Config(format!("no action client left for node '{instance_name}'"))
                })?;
                let lifecycle = GoalLifecycle::new(
                    &self.config,
                    Arc::clone(&collaborators.frames),
                    Arc::clone(&collaborators.config_service),
                    client,
                );
                Ok(Box::new(NavigateTo::new(instance_name, ports, lifecycle)))
            }
            NodeKind::DirectionalGate => Ok(Box::new(IsInFront::new(
                instance_name,
                ports,
                Arc::clone(&collaborators.detections),
                blackboard,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navgate_middleware::{ServiceMonitor, action_channel};
    use navgate_perception::{DetectionBoard, DetectorStream, TfBuffer};
    use std::time::Duration;

    fn collaborators() -> (Collaborators, Arc<DetectionBoard>) {
        let tf = TfBuffer::new();
        let board = Arc::new(DetectionBoard::new(tf.clone(), "base_link"));
        let (client, _server) = action_channel("/navigate_to_pose");
        let bundle = Collaborators {
            frames: Arc::new(tf),
            config_service: Arc::new(ServiceMonitor::new("svc", Duration::from_secs(1))),
            action_client: Some(Box::new(client)),
            detections: board.clone(),
        };
        (bundle, board)
    }

    #[test]
    fn every_builtin_resolves_to_its_kind() {
        let registry = NodeRegistry::default();
        for (name, kind) in BUILTIN_NODES {
            assert_eq!(registry.kind_of(name), Some(*kind));
        }
    }

    #[test]
    fn builds_both_node_kinds() {
        let registry = NodeRegistry::default();
        let (mut bundle, board) = collaborators();
        let bb = Blackboard::new();

        let nav = registry
            .build("NavigateTo", "go_home", PortMap::new(), &mut bundle, &bb)
            .unwrap();
        assert_eq!(nav.name(), "go_home");
        assert!(bundle.action_client.is_none());

        let gate = registry
            .build("IsInFront", "facing", PortMap::new().with("what", "person"), &mut bundle, &bb)
            .unwrap();
        assert_eq!(gate.name(), "facing");
        assert!(board.is_active(DetectorStream::People));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let (mut bundle, _) = collaborators();
        let err = NodeRegistry::default()
            .build("Wander", "w", PortMap::new(), &mut bundle, &Blackboard::new())
            .err()
            .unwrap();
        assert_eq!(err, NavError::UnknownNodeType("Wander".to_string()));
    }

    #[test]
    fn second_navigate_to_needs_its_own_client() {
        let registry = NodeRegistry::default();
        let (mut bundle, _) = collaborators();
        let bb = Blackboard::new();
        assert!(registry.build("NavigateTo", "a", PortMap::new(), &mut bundle, &bb).is_ok());
        let err = registry
            .build("NavigateTo", "b", PortMap::new(), &mut bundle, &bb)
            .err()
            .unwrap();
        assert!(matches!(err, NavError::Config(_)));
    }
}
