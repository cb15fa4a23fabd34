//! Navigation action client.
//!
//! The decision nodes never talk to a navigation backend directly.  They hold
//! a [`ActionClient`] and, once per tick, either send a goal or poll for the
//! terminal [`GoalOutcome`] of the one they already sent.
//!
//! [`action_channel`] builds the in-process implementation: a
//! [`ChannelActionClient`] for the node and an [`ActionServerHandle`] for
//! whatever executes the goals (a bridge to a real navigation stack, or a
//! simulator).  Both directions are Tokio mpsc channels, so the client side
//! never blocks and never needs a running runtime.
//!
//! # Example
//!
//! ```rust
//! use navgate_middleware::action_client::{action_channel, ActionClient, GoalCommand};
//! use navgate_types::{GoalSpec, OutcomeKind, Pose};
//!
//! let (mut client, mut server) = action_channel("/navigate_to_pose");
//! let goal = GoalSpec { frame_id: "map".into(), pose: Pose::from_xy(1.0, 0.0), truncation: None };
//!
//! let id = client.send(goal).unwrap();
//! assert!(matches!(server.try_next_command(), Some(GoalCommand::Send { .. })));
//!
//! server.complete(id, OutcomeKind::Succeeded).unwrap();
//! assert_eq!(client.poll_outcome().unwrap().kind, OutcomeKind::Succeeded);
//! ```

use navgate_types::{GoalId, GoalOutcome, GoalSpec, NavError, OutcomeKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Contract
// ─────────────────────────────────────────────────────────────────────────────

/// Client side of a goal-based navigation action.
///
/// At most one goal is outstanding at a time.  Every goal gets a fresh
/// [`GoalId`]; outcomes carry the id of the goal they finish.
pub trait ActionClient: Send {
    /// Dispatch a new goal.
    fn send(&mut self, goal: GoalSpec) -> Result<GoalId, NavError>;

    /// Replace the outstanding goal without a cancel/resend cycle.
    fn update_goal(&mut self, goal: GoalSpec) -> Result<GoalId, NavError>;

    /// Ask the server to cancel the outstanding goal.  The server answers
    /// with an [`OutcomeKind::Cancelled`] outcome.  No-op when idle.
    fn cancel(&mut self) -> Result<(), NavError>;

    /// Non-blocking check for a terminal outcome.
    fn poll_outcome(&mut self) -> Option<GoalOutcome>;
}

/// A request travelling from the client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalCommand {
    Send { goal_id: GoalId, goal: GoalSpec },
    Update { goal_id: GoalId, goal: GoalSpec },
    Cancel { goal_id: GoalId },
}

impl GoalCommand {
    pub fn goal_id(&self) -> GoalId {
        match self {
            GoalCommand::Send { goal_id, .. }
            | GoalCommand::Update { goal_id, .. }
            | GoalCommand::Cancel { goal_id } => *goal_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Create a connected client/server pair for the action `action_name`.
pub fn action_channel(action_name: impl Into<String>) -> (ChannelActionClient, ActionServerHandle) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let action_name = action_name.into();
    (
        ChannelActionClient {
            action_name: action_name.clone(),
            commands: command_tx,
            outcomes: outcome_rx,
            active: None,
        },
        ActionServerHandle {
            action_name,
            commands: command_rx,
            outcomes: outcome_tx,
        },
    )
}

/// [`ActionClient`] backed by Tokio mpsc channels.
#[derive(Debug)]
pub struct ChannelActionClient {
    action_name: String,
    commands: mpsc::UnboundedSender<GoalCommand>,
    outcomes: mpsc::UnboundedReceiver<GoalOutcome>,
    active: Option<GoalId>,
}

impl ChannelActionClient {
    /// Id of the goal currently awaiting an outcome.
    pub fn active_goal(&self) -> Option<GoalId> {
        self.active
    }

    fn push(&self, command: GoalCommand) -> Result<(), NavError> {
        self.commands.send(command).map_err(|_| {
            NavError::ActionServer(format!("action server '{}' is not connected", self.action_name))
        })
    }
}

impl ActionClient for ChannelActionClient {
    fn send(&mut self, goal: GoalSpec) -> Result<GoalId, NavError> {
        let goal_id = GoalId::new();
        self.push(GoalCommand::Send { goal_id, goal })?;
        self.active = Some(goal_id);
        debug!(action = %self.action_name, %goal_id, "goal sent");
        Ok(goal_id)
    }

    fn update_goal(&mut self, goal: GoalSpec) -> Result<GoalId, NavError> {
        let goal_id = GoalId::new();
        self.push(GoalCommand::Update { goal_id, goal })?;
        self.active = Some(goal_id);
        debug!(action = %self.action_name, %goal_id, "goal updated");
        Ok(goal_id)
    }

    fn cancel(&mut self) -> Result<(), NavError> {
        match self.active {
            Some(goal_id) => self.push(GoalCommand::Cancel { goal_id }),
            None => Ok(()),
        }
    }

    fn poll_outcome(&mut self) -> Option<GoalOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => {
                if self.active == Some(outcome.goal_id) {
                    self.active = None;
                }
                Some(outcome)
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
            // A vanished server can never finish the goal; report it aborted.
            Err(mpsc::error::TryRecvError::Disconnected) => self.active.take().map(|goal_id| {
                warn!(action = %self.action_name, %goal_id, "action server disconnected; aborting goal");
                GoalOutcome {
                    goal_id,
                    kind: OutcomeKind::Aborted,
                }
            }),
        }
    }
}

/// Server end of an [`action_channel`].
#[derive(Debug)]
pub struct ActionServerHandle {
    action_name: String,
    commands: mpsc::UnboundedReceiver<GoalCommand>,
    outcomes: mpsc::UnboundedSender<GoalOutcome>,
}

impl ActionServerHandle {
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    /// Non-blocking receive of the next client request.
    pub fn try_next_command(&mut self) -> Option<GoalCommand> {
        self.commands.try_recv().ok()
    }

    /// Wait for the next client request.  Returns `None` once the client has
    /// been dropped.
    pub async fn next_command(&mut self) -> Option<GoalCommand> {
        self.commands.recv().await
    }

    /// Report the terminal outcome of `goal_id`.
    pub fn complete(&self, goal_id: GoalId, kind: OutcomeKind) -> Result<(), NavError> {
        self.outcomes
            .send(GoalOutcome { goal_id, kind })
            .map_err(|_| NavError::ActionServer(format!("client of '{}' has gone away", self.action_name)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
