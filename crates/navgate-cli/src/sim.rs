//! Simulated robot for the demo mission.
//!
//! Stands in for the navigation backend, the truncation configuration
//! service and the people detector, all driven from the tick loop.

use std::sync::Arc;
use std::time::Duration;

use navgate_middleware::{ActionServerHandle, GoalCommand, ServiceMonitor};
use navgate_perception::{DetectionBoard, DetectorStream, TfBuffer, Transform3D};
use navgate_types::{DetectionRecord, GoalId, GoalSpec, OutcomeKind, Pose, Quaternion, Vec3};
use tracing::{debug, info, warn};

/// Ticks a goal takes to complete.
const TRAVEL_TICKS: u32 = 5;

/// Named spot in front of the visitor, facing them.
pub const APPROACH_FRAME: &str = "visitor_approach";

struct ActiveGoal {
    id: GoalId,
    goal: GoalSpec,
    remaining: u32,
}

/// Simulated world the mission runs against.
pub struct SimWorld {
    pub tf: TfBuffer,
    pub detections: Arc<DetectionBoard>,
    pub truncation_service: Arc<ServiceMonitor>,
    server: ActionServerHandle,
    world_frame: String,
    robot_frame: String,
    robot: Pose,
    /// Where the visitor stands, in the world frame.
    visitor: Vec3,
    active: Option<ActiveGoal>,
    pub completed_goals: usize,
}

impl SimWorld {
    pub fn new(server: ActionServerHandle, world_frame: &str, robot_frame: &str, truncation_service: &str) -> Self {
        let tf = TfBuffer::new();
        let detections = Arc::new(DetectionBoard::new(tf.clone(), robot_frame));
        let monitor = Arc::new(ServiceMonitor::new(truncation_service, Duration::from_secs(2)));
        let world = Self {
            tf,
            detections,
            truncation_service: monitor,
            server,
            world_frame: world_frame.to_string(),
            robot_frame: robot_frame.to_string(),
            robot: Pose::default(),
            visitor: Vec3::new(4.0, 1.0, 0.0),
            active: None,
            completed_goals: 0,
        };
        world.publish_robot();

        let approach = Vec3::new(2.0, 0.5, 0.0);
        let facing = (world.visitor.y - approach.y).atan2(world.visitor.x - approach.x);
        world.tf.set_transform(
            world_frame,
            APPROACH_FRAME,
            Transform3D::new(approach, Quaternion::from_yaw(facing)),
        );
        world
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        self.truncation_service.heartbeat();

        while let Some(command) = self.server.try_next_command() {
            match command {
                GoalCommand::Send { goal_id, goal } | GoalCommand::Update { goal_id, goal } => {
                    info!(%goal_id, x = goal.pose.position.x, y = goal.pose.position.y, "sim: accepted goal");
                    self.active = Some(ActiveGoal {
                        id: goal_id,
                        goal,
                        remaining: TRAVEL_TICKS,
                    });
                }
                GoalCommand::Cancel { goal_id } => {
                    if self.active.as_ref().is_some_and(|a| a.id == goal_id) {
                        self.active = None;
                        self.finish(goal_id, OutcomeKind::Cancelled);
                    }
                }
            }
        }

        if let Some(active) = self.active.as_mut() {
            active.remaining = active.remaining.saturating_sub(1);
            if active.remaining == 0 {
                let id = active.id;
                self.robot = active.goal.pose;
                self.active = None;
                self.publish_robot();
                self.finish(id, OutcomeKind::Succeeded);
            }
        }

        self.detections.update(DetectorStream::People, vec![self.visitor_detection()]);
    }

    /// Drain commands sent during shutdown.
    pub fn settle(&mut self) {
        self.step();
    }

    fn finish(&mut self, goal_id: GoalId, kind: OutcomeKind) {
        if kind == OutcomeKind::Succeeded {
            self.completed_goals += 1;
        }
        if let Err(e) = self.server.complete(goal_id, kind) {
            warn!(error = %e, "sim: cannot report outcome");
        }
    }

    fn publish_robot(&self) {
        self.tf.set_transform(
            &self.world_frame,
            &self.robot_frame,
            Transform3D::new(self.robot.position, self.robot.orientation),
        );
    }

    /// The visitor as the robot's camera sees it.
    fn visitor_detection(&self) -> DetectionRecord {
        let relative = self
            .robot
            .orientation
            .conjugate()
            .rotate(self.visitor.add(Vec3::new(-self.robot.position.x, -self.robot.position.y, 0.0)));
        debug!(x = relative.x, y = relative.y, "sim: visitor seen");
        DetectionRecord::new("person", relative, 0.92)
    }
}
