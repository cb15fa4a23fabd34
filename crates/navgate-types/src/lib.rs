//! `navgate-types` – shared data model for the navigation decision nodes.
//!
//! Everything that crosses a crate boundary lives here: the geometric
//! primitives, the outgoing [`GoalSpec`], the tagged [`GoalOutcome`] reported
//! by the action client, perceived [`DetectionRecord`]s and the workspace-wide
//! [`NavError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw_rad` around the Z axis.
    pub fn from_yaw(yaw_rad: f64) -> Self {
        let half = yaw_rad * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    /// A planar pose at `(x, y)` with the identity orientation.
    pub fn from_xy(x: f64, y: f64) -> Self {
        Self {
            position: Vec3::new(x, y, 0.0),
            orientation: Quaternion::identity(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Goals
// ────────────────────────────────────────────────────────────────────────────

/// Reference to a generated "truncated" navigation policy.
///
/// The reference is fully determined by `distance_tolerance`, so two goals
/// resolved with the same tolerance point at the same artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncationPolicyRef {
    /// Opaque identifier of the artifact (a file path for file-based
    /// dispatchers).
    pub policy_id: String,
    /// Tolerance (metres) the policy was instantiated with.
    pub distance_tolerance: f64,
}

/// The resolved outgoing navigation goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSpec {
    /// Frame the pose is expressed in.  Always the world frame.
    pub frame_id: String,
    pub pose: Pose,
    /// Present when the goal should stop short of the target.
    pub truncation: Option<TruncationPolicyRef>,
}

/// Identifier the action client assigns to every dispatched goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub Uuid);

impl GoalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal result of a dispatched goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Succeeded,
    Aborted,
    Cancelled,
}

/// A terminal outcome tagged with the goal it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalOutcome {
    pub goal_id: GoalId,
    pub kind: OutcomeKind,
}

// ────────────────────────────────────────────────────────────────────────────
// Perception
// ────────────────────────────────────────────────────────────────────────────

/// One perceived entity, expressed in the robot frame (+X forward, +Y left).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Entity class resolved upstream (e.g. `"person"`, `"cup"`).  An empty
    /// class in a query template matches every class.
    pub class_name: String,
    /// Centre of the detection (metres).
    pub center: Vec3,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

impl DetectionRecord {
    pub fn new(class_name: impl Into<String>, center: Vec3, confidence: f64) -> Self {
        Self {
            class_name: class_name.into(),
            center,
            confidence,
        }
    }

    /// Signed horizontal angle from the forward axis to the centre, in
    /// degrees.  Positive values are to the left.
    pub fn bearing_deg(&self) -> f64 {
        self.center.y.atan2(self.center.x).to_degrees()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every navgate crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error("Transform Unavailable: {from_frame} -> {to_frame}: {details}")]
    Transform {
        from_frame: String,
        to_frame: String,
        details: String,
    },

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Action Server Error: {0}")]
    ActionServer(String),

    #[error("Port Error on '{port}': {details}")]
    Port { port: String, details: String },

    #[error("Invalid Distance Tolerance: {0}")]
    InvalidTolerance(f64),

    #[error("Unknown Node Type: {0}")]
    UnknownNodeType(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Policy Artifact Error: {0}")]
    PolicyArtifact(String),
}

impl NavError {
    /// `true` for conditions that may clear on a later tick (missing frames,
    /// services not yet up, an unreachable action server).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NavError::Transform { .. } | NavError::ServiceUnavailable(_) | NavError::ActionServer(_)
        )
    }
}
