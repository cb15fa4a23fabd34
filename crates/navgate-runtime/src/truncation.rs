//! Truncated navigation policies.
//!
//! A *truncated* goal tells the navigation backend to stop short of the
//! target by a distance tolerance.  The backend runs it as a variant of its
//! own navigation behavior tree, generated here from a template with the
//! tolerance substituted in.
//!
//! - [`TruncationTemplate`] renders the policy document and derives its
//!   reference.  The reference depends on nothing but the tolerance, so
//!   dispatchers can cache artifacts by reference.
//! - [`TruncationPolicyGate`] checks, before every dispatch, that the
//!   backend's truncation configuration service is up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use navgate_middleware::ConfigService;
use navgate_types::{NavError, TruncationPolicyRef};
use tracing::{debug, warn};

/// Placeholder replaced by the tolerance when rendering a template.
pub const TOLERANCE_PLACEHOLDER: &str = "{{distance_tolerance}}";

/// Navigation tree that follows the planned path but prunes its last
/// `distance_tolerance` metres.
pub const DEFAULT_TRUNCATED_POLICY: &str = r#"<root main_tree_to_execute="MainTree">
  <BehaviorTree ID="MainTree">
    <PipelineSequence name="NavigateWithReplanning">
      <RateController hz="1.0">
        <Sequence name="ComputeAndTruncate">
          <ComputePathToPose goal="{goal}" path="{path}" planner_id="GridBased"/>
          <TruncatePath distance="{{distance_tolerance}}" input_path="{path}" output_path="{truncated_path}"/>
        </Sequence>
      </RateController>
      <FollowPath path="{truncated_path}" controller_id="FollowPath"/>
    </PipelineSequence>
  </BehaviorTree>
</root>
"#;

// ─────────────────────────────────────────────────────────────────────────────
// TruncationTemplate
// ─────────────────────────────────────────────────────────────────────────────

/// Template for truncated navigation policies.
#[derive(Debug, Clone)]
pub struct TruncationTemplate {
    template: String,
    policy_dir: PathBuf,
}

impl TruncationTemplate {
    /// `template` must contain [`TOLERANCE_PLACEHOLDER`]; artifacts are
    /// referenced (and materialized) under `policy_dir`.
    pub fn new(template: impl Into<String>, policy_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            policy_dir: policy_dir.into(),
        }
    }

    pub fn policy_dir(&self) -> &Path {
        &self.policy_dir
    }

    /// Path of the artifact for `distance_tolerance`.
    ///
    /// The tolerance is written in its shortest round-trip form, so distinct
    /// tolerances never share a path and equal ones always do (`-0.0` keys
    /// as `0`).
    pub fn policy_path(&self, distance_tolerance: f64) -> PathBuf {
        let key = format!("{}", unsigned_zero(distance_tolerance)).replace('.', "_");
        self.policy_dir.join(format!("nav_to_pose_truncated_{key}.xml"))
    }

    /// Render the policy document for `distance_tolerance`.
    pub fn render(&self, distance_tolerance: f64) -> Result<String, NavError> {
        let distance_tolerance = validate(distance_tolerance)?;
        Ok(self
            .template
            .replace(TOLERANCE_PLACEHOLDER, &format!("{distance_tolerance}")))
    }

    /// Reference to the policy for `distance_tolerance`.  Pure: nothing is
    /// written.
    pub fn instantiate(&self, distance_tolerance: f64) -> Result<TruncationPolicyRef, NavError> {
        let distance_tolerance = validate(distance_tolerance)?;
        Ok(TruncationPolicyRef {
            policy_id: self.policy_path(distance_tolerance).to_string_lossy().into_owned(),
            distance_tolerance,
        })
    }

    /// Write the artifact for `policy` to disk unless it is already there.
    pub fn materialize(&self, policy: &TruncationPolicyRef) -> Result<PathBuf, NavError> {
        let path = PathBuf::from(&policy.policy_id);
        if path.exists() {
            return Ok(path);
        }
        let document = self.render(policy.distance_tolerance)?;
        fs::create_dir_all(&self.policy_dir).map_err(|e| {
            NavError::PolicyArtifact(format!("cannot create {}: {e}", self.policy_dir.display()))
        })?;
        fs::write(&path, document)
            .map_err(|e| NavError::PolicyArtifact(format!("cannot write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "truncated policy written");
        Ok(path)
    }
}

/// Accepted tolerances are finite and non-negative; returned with `-0.0`
/// folded into `0.0`.
fn validate(distance_tolerance: f64) -> Result<f64, NavError> {
    if distance_tolerance.is_finite() && distance_tolerance >= 0.0 {
        Ok(unsigned_zero(distance_tolerance))
    } else {
        Err(NavError::InvalidTolerance(distance_tolerance))
    }
}

fn unsigned_zero(value: f64) -> f64 {
    value + 0.0
}

// ─────────────────────────────────────────────────────────────────────────────
// TruncationPolicyGate
// ─────────────────────────────────────────────────────────────────────────────

/// Answer of [`TruncationPolicyGate::check_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not an error: the caller re-ticks later.
    NotReady,
}

/// Precondition run before every goal dispatch, truncated or not.
pub struct TruncationPolicyGate {
    service: Arc<dyn ConfigService>,
}

impl TruncationPolicyGate {
    pub fn new(service: Arc<dyn ConfigService>) -> Self {
        Self { service }
    }

    /// Wait at most `timeout` for the configuration service.
    pub fn check_ready(&self, timeout: Duration) -> Readiness {
        if self.service.wait_ready(timeout) {
            Readiness::Ready
        } else {
            warn!(?timeout, "waiting for the truncation configuration service to come up");
            Readiness::NotReady
        }
    }
}
