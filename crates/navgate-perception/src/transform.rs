//! Transform Frame (TF) Engine.
//!
//! Maintains a directed graph of named reference frames and the rigid-body
//! transforms (translation + quaternion rotation) that relate them.  Goal
//! resolution queries it through the [`FrameLookup`] trait; [`TfBuffer`] is
//! the shared, lock-protected handle that both the resolver and the detection
//! board hold.
//!
//! # Example
//!
//! ```rust
//! use navgate_perception::transform::{FrameLookup, TfBuffer, Transform3D};
//! use navgate_types::{Quaternion, Vec3};
//!
//! let tf = TfBuffer::new();
//! tf.set_transform("map", "base_link",
//!     Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
//! tf.set_transform("base_link", "person_1",
//!     Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity()));
//!
//! let t = tf.lookup("map", "person_1").unwrap();
//! assert!((t.translation.x - 1.5).abs() < 1e-9);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use navgate_types::{NavError, Quaternion, Vec3};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: translation followed by rotation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lookup contract
// ────────────────────────────────────────────────────────────────────────────

/// Why a frame lookup could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("no transform chain from '{from_frame}' to '{to_frame}'")]
    NoPath { from_frame: String, to_frame: String },

    #[error("transform buffer is unavailable: {0}")]
    BufferUnavailable(String),
}

impl From<TransformError> for NavError {
    fn from(err: TransformError) -> Self {
        match &err {
            TransformError::NoPath {
                from_frame,
                to_frame,
            } => NavError::Transform {
                from_frame: from_frame.clone(),
                to_frame: to_frame.clone(),
                details: err.to_string(),
            },
            TransformError::BufferUnavailable(_) => NavError::Transform {
                from_frame: String::new(),
                to_frame: String::new(),
                details: err.to_string(),
            },
        }
    }
}

/// Anything that can answer "where is `target_frame` relative to
/// `source_frame`" without blocking for longer than a cache query.
pub trait FrameLookup: Send + Sync {
    fn lookup(&self, source_frame: &str, target_frame: &str)
        -> Result<Transform3D, TransformError>;
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A directed graph of named reference frames and the [`Transform3D`]s that
/// relate them.
///
/// Edges are directional: adding `"A" → "B"` does not create the inverse.
/// [`TfEngine::lookup`] performs BFS to find the shortest path from source
/// to target and returns the composed transform.
#[derive(Debug, Default)]
pub struct TfEngine {
    /// `edges[from][to] = Transform3D`
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the transform from `parent_frame` to `child_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
    }

    /// `true` if `frame` appears anywhere in the graph.
    pub fn has_frame(&self, frame: &str) -> bool {
        self.edges.contains_key(frame) || self.edges.values().any(|children| children.contains_key(frame))
    }
}

impl FrameLookup for TfEngine {
    fn lookup(&self, source_frame: &str, target_frame: &str) -> Result<Transform3D, TransformError> {
        if source_frame == target_frame {
            return Ok(Transform3D::identity());
        }

        // BFS; each queue item carries the transform accumulated from
        // source_frame to the current node.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((source_frame.to_string(), Transform3D::identity()));
        visited.insert(source_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            if let Some(neighbours) = self.edges.get(&current) {
                for (next, edge_tf) in neighbours {
                    if visited.contains(next) {
                        continue;
                    }
                    let composed = accumulated.compose(*edge_tf);
                    if next == target_frame {
                        return Ok(composed);
                    }
                    visited.insert(next.clone());
                    queue.push_back((next.clone(), composed));
                }
            }
        }

        Err(TransformError::NoPath {
            from_frame: source_frame.to_string(),
            to_frame: target_frame.to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfBuffer
// ────────────────────────────────────────────────────────────────────────────

/// Cheaply clonable, shared handle to a [`TfEngine`].
///
/// All clones see the same frame graph.
#[derive(Debug, Clone, Default)]
pub struct TfBuffer {
    inner: Arc<RwLock<TfEngine>>,
}

impl TfBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the transform from `parent_frame` to `child_frame`.
    ///
    /// A poisoned lock is recovered: the graph holds plain data and cannot be
    /// left half-updated by a panicking writer.
    pub fn set_transform(&self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        let mut engine = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        engine.set_transform(parent_frame, child_frame, transform);
    }

    pub fn has_frame(&self, frame: &str) -> bool {
        match self.inner.read() {
            Ok(engine) => engine.has_frame(frame),
            Err(poisoned) => poisoned.into_inner().has_frame(frame),
        }
    }
}

impl FrameLookup for TfBuffer {
    fn lookup(&self, source_frame: &str, target_frame: &str) -> Result<Transform3D, TransformError> {
        let engine = self
            .inner
            .read()
            .map_err(|e| TransformError::BufferUnavailable(e.to_string()))?;
        engine.lookup(source_frame, target_frame)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn offset(x: f64) -> Transform3D {
        Transform3D::new(Vec3::new(x, 0.0, 0.0), Quaternion::identity())
    }

    #[test]
    fn transform_identity_compose_is_noop() {
        let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
        let composed = Transform3D::identity().compose(t);
        assert!((composed.translation.x - 1.0).abs() < 1e-9);
        assert!((composed.translation.y - 2.0).abs() < 1e-9);
        assert!((composed.translation.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_same_frame_returns_identity() {
        let tf = TfEngine::new();
        assert_eq!(tf.lookup("map", "map").unwrap(), Transform3D::identity());
    }

    #[test]
    fn lookup_composed_chain() {
        let mut tf = TfEngine::new();
        tf.set_transform("map", "base_link", offset(1.0));
        tf.set_transform("base_link", "camera", offset(0.5));

        let t = tf.lookup("map", "camera").unwrap();
        assert!((t.translation.x - 1.5).abs() < 1e-9);
    }

    #[test]
    fn lookup_no_path_is_an_error() {
        let mut tf = TfEngine::new();
        tf.set_transform("map", "base_link", offset(1.0));
        assert_eq!(
            tf.lookup("base_link", "map"),
            Err(TransformError::NoPath {
                from_frame: "base_link".to_string(),
                to_frame: "map".to_string(),
            })
        );
        assert!(tf.lookup("map", "ghost_frame").is_err());
    }

    #[test]
    fn set_transform_overrides_previous() {
        let mut tf = TfEngine::new();
        tf.set_transform("map", "sensor", offset(1.0));
        tf.set_transform("map", "sensor", offset(5.0));

        let t = tf.lookup("map", "sensor").unwrap();
        assert!((t.translation.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_respects_rotation_in_chain() {
        // base_link at the origin yawed 90°, camera 1 m ahead of it.
        let q90z = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let mut tf = TfEngine::new();
        tf.set_transform("map", "base_link", Transform3D::new(Vec3::zero(), q90z));
        tf.set_transform("base_link", "camera", offset(1.0));

        let t = tf.lookup("map", "camera").unwrap();
        assert!(t.translation.x.abs() < 1e-9, "x={}", t.translation.x);
        assert!((t.translation.y - 1.0).abs() < 1e-9, "y={}", t.translation.y);
        assert!((t.rotation.z - FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn buffer_clones_share_the_graph() {
        let tf = TfBuffer::new();
        let reader = tf.clone();
        tf.set_transform("map", "kitchen", offset(4.0));

        assert!(reader.has_frame("kitchen"));
        let t = reader.lookup("map", "kitchen").unwrap();
        assert!((t.translation.x - 4.0).abs() < 1e-9);
    }

    #[test]
    fn transform_error_converts_into_nav_error() {
        let err: NavError = TransformError::NoPath {
            from_frame: "map".to_string(),
            to_frame: "door".to_string(),
        }
        .into();
        assert!(matches!(err, NavError::Transform { ref to_frame, .. } if to_frame == "door"));
    }
}
