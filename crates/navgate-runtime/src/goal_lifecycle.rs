//! [`GoalLifecycle`] – the retry/finish state machine behind `NavigateTo`.
//!
//! Wraps a single outstanding navigation goal.  Each tick:
//!
//! 1. **Idle** – resolve a goal ([`GoalResolver`]), check the truncation
//!    configuration service ([`TruncationPolicyGate`]) and send it.  A failed
//!    frame lookup, a service that is not up yet or an unreachable action
//!    server keep the node at [`NodeStatus::Running`] without changing state.
//! 2. **Dispatching** – poll the [`ActionClient`] for the terminal outcome of
//!    the goal in flight.  Nothing is re-sent while a goal is outstanding, and
//!    outcomes tagged with an older goal id are dropped.
//! 3. **Succeeded / Aborted / Cancelled** – apply [`continuation`]:
//!
//! | Outcome | `will_finish` | Result |
//! |---|---|---|
//! | Succeeded | `true` | Done, [`NodeStatus::Success`] |
//! | Aborted | `true` | Done, [`NodeStatus::Failure`] |
//! | Cancelled | `true` | Done, [`NodeStatus::Success`] |
//! | any | `false` | re-resolve, update goal, [`NodeStatus::Running`] |
//!
//! When the follow-up goal cannot be dispatched on the same tick, the
//! lifecycle stays in the outcome state and retries the continuation on the
//! next tick.
//!
//! **Done** is terminal for the current activation.  Ticking a finished
//! lifecycle starts a fresh activation from Idle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use navgate_middleware::{ActionClient, ConfigService};
use navgate_perception::FrameLookup;
use navgate_types::{GoalId, GoalSpec, OutcomeKind};
use tracing::{debug, error, info, warn};

use crate::behavior_tree::{NodeStatus, TreeNode};
use crate::goal_resolver::{GoalContext, GoalResolver};
use crate::ports::{Blackboard, PortMap};
use crate::truncation::{DEFAULT_TRUNCATED_POLICY, Readiness, TruncationPolicyGate, TruncationTemplate};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for the navigation node.
#[derive(Debug, Clone)]
pub struct NavigateConfig {
    /// Frame every goal is expressed in.
    pub world_frame: String,
    /// Longest wait for the truncation configuration service per tick.
    pub readiness_timeout: Duration,
    /// Directory truncated policy artifacts are referenced under.
    pub policy_dir: PathBuf,
    /// Policy template containing the tolerance placeholder.
    pub policy_template: String,
    /// Write each truncated policy to `policy_dir` before dispatching it.
    /// On by default, so a truncated goal's reference always names a file.
    pub materialize_policies: bool,
}

impl Default for NavigateConfig {
    fn default() -> Self {
        Self {
            world_frame: "map".to_string(),
            readiness_timeout: Duration::from_secs(1),
            policy_dir: std::env::temp_dir().join("navgate").join("policies"),
            policy_template: DEFAULT_TRUNCATED_POLICY.to_string(),
            materialize_policies: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of the navigation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Dispatching,
    Succeeded,
    Aborted,
    Cancelled,
    Done,
}

impl From<OutcomeKind> for LifecycleState {
    fn from(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::Succeeded => LifecycleState::Succeeded,
            OutcomeKind::Aborted => LifecycleState::Aborted,
            OutcomeKind::Cancelled => LifecycleState::Cancelled,
        }
    }
}

/// What to do after a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Report the final verdict.
    Finish(NodeStatus),
    /// Pick a new goal and keep navigating.
    Renavigate,
}

/// The one rule shared by every terminal outcome.
///
/// A cancellation while finishing counts as a clean stop, not a failure.
pub fn continuation(outcome: OutcomeKind, will_finish: bool) -> Continuation {
    if !will_finish {
        return Continuation::Renavigate;
    }
    Continuation::Finish(match outcome {
        OutcomeKind::Succeeded => NodeStatus::Success,
        OutcomeKind::Aborted => NodeStatus::Failure,
        OutcomeKind::Cancelled => NodeStatus::Success,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    Send,
    Update,
}

/// Owns one navigation goal from resolution to final verdict.
pub struct GoalLifecycle {
    resolver: GoalResolver,
    gate: TruncationPolicyGate,
    client: Box<dyn ActionClient>,
    readiness_timeout: Duration,
    materialize_policies: bool,
    state: LifecycleState,
    will_finish: bool,
    goal_id: Option<GoalId>,
    current_goal: Option<GoalSpec>,
    goal_updated: bool,
    verdict: Option<NodeStatus>,
}

impl GoalLifecycle {
    pub fn new(
        config: &NavigateConfig,
        frames: Arc<dyn FrameLookup>,
        config_service: Arc<dyn ConfigService>,
        client: Box<dyn ActionClient>,
    ) -> Self {
        let template = TruncationTemplate::new(config.policy_template.clone(), config.policy_dir.clone());
        Self {
            resolver: GoalResolver::new(frames, config.world_frame.clone(), template),
            gate: TruncationPolicyGate::new(config_service),
            client,
            readiness_timeout: config.readiness_timeout,
            materialize_policies: config.materialize_policies,
            state: LifecycleState::Idle,
            will_finish: GoalContext::default().will_finish,
            goal_id: None,
            current_goal: None,
            goal_updated: false,
            verdict: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The goal most recently dispatched in this activation.
    pub fn current_goal(&self) -> Option<&GoalSpec> {
        self.current_goal.as_ref()
    }

    pub fn current_goal_id(&self) -> Option<GoalId> {
        self.goal_id
    }

    /// `true` once a terminal outcome has been turned into a follow-up goal.
    pub fn goal_updated(&self) -> bool {
        self.goal_updated
    }

    pub fn will_finish(&self) -> bool {
        self.will_finish
    }

    /// Final verdict of the activation, once [`LifecycleState::Done`].
    pub fn verdict(&self) -> Option<NodeStatus> {
        self.verdict
    }

    /// Advance the lifecycle by one tick using this tick's `context`.
    pub fn tick(&mut self, context: &GoalContext) -> NodeStatus {
        if self.state == LifecycleState::Done {
            debug!("starting a fresh navigation activation");
            self.reset();
        }
        self.will_finish = context.will_finish;

        match self.state {
            LifecycleState::Idle => self.dispatch(context, DispatchMode::Send),
            LifecycleState::Dispatching => match self.client.poll_outcome() {
                None => NodeStatus::Running,
                Some(outcome) if Some(outcome.goal_id) != self.goal_id => {
                    debug!(goal_id = %outcome.goal_id, kind = ?outcome.kind, "dropping outcome of a superseded goal");
                    NodeStatus::Running
                }
                Some(outcome) => {
                    info!(goal_id = %outcome.goal_id, kind = ?outcome.kind, "navigation finished");
                    self.state = outcome.kind.into();
                    self.goal_id = None;
                    self.on_outcome(outcome.kind, context)
                }
            },
            LifecycleState::Succeeded => self.on_outcome(OutcomeKind::Succeeded, context),
            LifecycleState::Aborted => self.on_outcome(OutcomeKind::Aborted, context),
            LifecycleState::Cancelled => self.on_outcome(OutcomeKind::Cancelled, context),
            // reset() above already left Done.
            LifecycleState::Done => NodeStatus::Running,
        }
    }

    /// Cancel the goal in flight, if any, and return to Idle.
    pub fn halt(&mut self) {
        if self.state == LifecycleState::Dispatching {
            info!(goal_id = ?self.goal_id, "halting navigation; cancelling goal");
            if let Err(e) = self.client.cancel() {
                warn!(error = %e, "could not cancel goal");
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = LifecycleState::Idle;
        self.goal_id = None;
        self.current_goal = None;
        self.goal_updated = false;
        self.verdict = None;
    }

    fn on_outcome(&mut self, outcome: OutcomeKind, context: &GoalContext) -> NodeStatus {
        match continuation(outcome, self.will_finish) {
            Continuation::Finish(status) => self.finish(status),
            Continuation::Renavigate => {
                self.goal_updated = true;
                self.dispatch(context, DispatchMode::Update)
            }
        }
    }

    fn finish(&mut self, status: NodeStatus) -> NodeStatus {
        self.state = LifecycleState::Done;
        self.verdict = Some(status);
        status
    }

    fn dispatch(&mut self, context: &GoalContext, mode: DispatchMode) -> NodeStatus {
        let goal = match self.resolver.resolve(context) {
            Ok(goal) => goal,
            Err(e) if e.is_transient() => return NodeStatus::Running,
            Err(e) => {
                error!(error = %e, "cannot build navigation goal");
                return self.finish(NodeStatus::Failure);
            }
        };

        if self.gate.check_ready(self.readiness_timeout) == Readiness::NotReady {
            return NodeStatus::Running;
        }

        if let (true, Some(policy)) = (self.materialize_policies, &goal.truncation) {
            if let Err(e) = self.resolver.template().materialize(policy) {
                error!(error = %e, "cannot prepare truncated navigation policy");
                return self.finish(NodeStatus::Failure);
            }
        }

        info!(
            x = goal.pose.position.x,
            y = goal.pose.position.y,
            qx = goal.pose.orientation.x,
            qy = goal.pose.orientation.y,
            qz = goal.pose.orientation.z,
            qw = goal.pose.orientation.w,
            frame = %goal.frame_id,
            truncated = goal.truncation.is_some(),
            "sending goal"
        );
        let sent = match mode {
            DispatchMode::Send => self.client.send(goal.clone()),
            DispatchMode::Update => self.client.update_goal(goal.clone()),
        };
        match sent {
            Ok(goal_id) => {
                self.goal_id = Some(goal_id);
                self.current_goal = Some(goal);
                self.state = LifecycleState::Dispatching;
            }
            Err(e) => warn!(error = %e, "goal not dispatched; retrying next tick"),
        }
        NodeStatus::Running
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NavigateTo node
// ─────────────────────────────────────────────────────────────────────────────

/// Behavior tree leaf that navigates to a frame or to coordinates.
///
/// Input ports: `tf_frame`, `x`, `y`, `will_finish`, `is_truncated`,
/// `distance_tolerance` (see [`GoalContext::from_ports`]).
pub struct NavigateTo {
    name: String,
    ports: PortMap,
    lifecycle: GoalLifecycle,
}

impl NavigateTo {
    pub fn new(name: impl Into<String>, ports: PortMap, lifecycle: GoalLifecycle) -> Self {
        Self {
            name: name.into(),
            ports,
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> &GoalLifecycle {
        &self.lifecycle
    }
}

impl TreeNode for NavigateTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        debug!(node = %self.name, "NavigateTo ticked");
        match GoalContext::from_ports(&self.ports, blackboard) {
            Ok(context) => self.lifecycle.tick(&context),
            Err(e) => {
                error!(node = %self.name, error = %e, "invalid NavigateTo input");
                self.lifecycle.halt();
                NodeStatus::Failure
            }
        }
    }

    fn halt(&mut self) {
        self.lifecycle.halt();
    }
}
