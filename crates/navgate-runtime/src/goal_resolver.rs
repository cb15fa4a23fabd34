//! [`GoalResolver`] – turns a [`GoalContext`] into a [`GoalSpec`].
//!
//! A goal is given either as a named reference frame (`tf_frame`) or as raw
//! `(x, y)` coordinates.  A non-empty frame always wins; the coordinates are
//! then ignored.  The resolved goal is always expressed in the world frame.
//!
//! | Input | Position | Orientation | Can fail? |
//! |---|---|---|---|
//! | `tf_frame` set | world → frame translation | world → frame rotation | yes, transiently |
//! | `tf_frame` empty | `(x, y, 0)` | identity | no |

use std::sync::Arc;

use navgate_perception::FrameLookup;
use navgate_types::{GoalSpec, NavError, Pose};
use tracing::{info, warn};

use crate::ports::{Blackboard, PortMap};
use crate::truncation::TruncationTemplate;

// ─────────────────────────────────────────────────────────────────────────────
// GoalContext
// ─────────────────────────────────────────────────────────────────────────────

/// Per-tick inputs of the navigation node.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalContext {
    /// Target frame; empty means "use `x`/`y`".
    pub tf_frame: String,
    pub x: f64,
    pub y: f64,
    /// Report a final verdict on the next terminal outcome instead of
    /// re-navigating.
    pub will_finish: bool,
    pub is_truncated: bool,
    /// Only read when `is_truncated` is set.
    pub distance_tolerance: f64,
}

impl Default for GoalContext {
    fn default() -> Self {
        Self {
            tf_frame: String::new(),
            x: 0.0,
            y: 0.0,
            will_finish: true,
            is_truncated: false,
            distance_tolerance: 0.0,
        }
    }
}

impl GoalContext {
    /// A coordinate goal.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// A frame goal.
    pub fn toward_frame(frame: impl Into<String>) -> Self {
        Self {
            tf_frame: frame.into(),
            ..Self::default()
        }
    }

    /// Read the context from the node's ports.
    ///
    /// Unbound ports take the [`Default`] values, except
    /// `distance_tolerance`, which must be present when `is_truncated` is set.
    pub fn from_ports(ports: &PortMap, blackboard: &Blackboard) -> Result<Self, NavError> {
        let defaults = Self::default();
        let is_truncated = ports.input_or("is_truncated", blackboard, defaults.is_truncated)?;
        let distance_tolerance = if is_truncated {
            ports
                .input::<f64>("distance_tolerance", blackboard)?
                .ok_or_else(|| NavError::Port {
                    port: "distance_tolerance".to_string(),
                    details: "required when is_truncated is set".to_string(),
                })?
        } else {
            defaults.distance_tolerance
        };

        Ok(Self {
            tf_frame: ports.input_or("tf_frame", blackboard, defaults.tf_frame)?,
            x: ports.input_or("x", blackboard, defaults.x)?,
            y: ports.input_or("y", blackboard, defaults.y)?,
            will_finish: ports.input_or("will_finish", blackboard, defaults.will_finish)?,
            is_truncated,
            distance_tolerance,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GoalResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Builds outgoing goals.
pub struct GoalResolver {
    frames: Arc<dyn FrameLookup>,
    world_frame: String,
    template: TruncationTemplate,
}

impl GoalResolver {
    pub fn new(frames: Arc<dyn FrameLookup>, world_frame: impl Into<String>, template: TruncationTemplate) -> Self {
        Self {
            frames,
            world_frame: world_frame.into(),
            template,
        }
    }

    pub fn world_frame(&self) -> &str {
        &self.world_frame
    }

    pub fn template(&self) -> &TruncationTemplate {
        &self.template
    }

    /// Resolve `context` into a goal.
    ///
    /// # Errors
    ///
    /// - [`NavError::Transform`] – the frame lookup failed.  Transient: the
    ///   caller retries on a later tick.
    /// - [`NavError::InvalidTolerance`] – a truncated goal with a negative or
    ///   non-finite tolerance.
    pub fn resolve(&self, context: &GoalContext) -> Result<GoalSpec, NavError> {
        let pose = if context.tf_frame.is_empty() {
            info!(x = context.x, y = context.y, "setting goal from coordinates");
            Pose::from_xy(context.x, context.y)
        } else {
            info!(from = %self.world_frame, to = %context.tf_frame, "resolving goal from frame");
            let transform = self
                .frames
                .lookup(&self.world_frame, &context.tf_frame)
                .map_err(|e| {
                    warn!(from = %self.world_frame, to = %context.tf_frame, error = %e, "could not transform");
                    NavError::from(e)
                })?;
            Pose {
                position: transform.translation,
                orientation: transform.rotation,
            }
        };

        let truncation = if context.is_truncated {
            Some(self.template.instantiate(context.distance_tolerance)?)
        } else {
            None
        };

        Ok(GoalSpec {
            frame_id: self.world_frame.clone(),
            pose,
            truncation,
        })
    }
}
