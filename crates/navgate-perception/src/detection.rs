//! Detection query service.
//!
//! The perception pipeline deposits robot-relative [`DetectionRecord`]s into a
//! [`DetectionBoard`], one list per [`DetectorStream`].  Decision nodes query
//! the board through the [`DetectionService`] trait with a template record and
//! a confidence threshold and get back matches ranked best-first.
//!
//! Only streams that some node has activated are consulted; a stream that
//! nobody asked for is treated as switched off.
//!
//! # Ranking
//!
//! 1. Higher confidence first.
//! 2. On equal confidence, the detection closer to the robot first.
//!
//! Detections whose centre has a non-finite coordinate never match.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use navgate_types::{DetectionRecord, Quaternion};
use tracing::{debug, error};

use crate::transform::{TfBuffer, Transform3D};

// ────────────────────────────────────────────────────────────────────────────
// DetectorStream
// ────────────────────────────────────────────────────────────────────────────

/// Upstream detector that produces detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorStream {
    People,
    Objects,
}

impl DetectorStream {
    /// Resolve the `what` input of a gate node.
    ///
    /// `"person"` selects [`DetectorStream::People`], `"object"` selects
    /// [`DetectorStream::Objects`].  Anything else falls back to the object
    /// stream and logs an error.
    pub fn from_what(what: &str) -> Self {
        match what {
            "person" => DetectorStream::People,
            "object" => DetectorStream::Objects,
            other => {
                error!(what = other, "unknown detector selector; activating generic object detection");
                DetectorStream::Objects
            }
        }
    }

    /// Name of the lifecycle node that runs this detector.
    pub fn activation_name(self) -> &'static str {
        match self {
            DetectorStream::People => "perception_system/perception_people_detection",
            DetectorStream::Objects => "perception_system/perception_object_detection",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Service contract
// ────────────────────────────────────────────────────────────────────────────

/// The perception capability a gate node is handed at construction.
pub trait DetectionService: Send + Sync {
    /// Switch on `stream`.  Activating an already active stream is a no-op.
    fn activate(&self, stream: DetectorStream);

    /// Detections matching `template` with confidence at or above
    /// `confidence_threshold`, ranked best-first.
    fn query(&self, template: &DetectionRecord, confidence_threshold: f64) -> Vec<DetectionRecord>;

    /// Publish `detection` as a named reference frame `label`.  Publishing the
    /// same label again replaces the previous frame.
    fn publish_reference(&self, detection: &DetectionRecord, label: &str);
}

// ────────────────────────────────────────────────────────────────────────────
// DetectionBoard
// ────────────────────────────────────────────────────────────────────────────

/// In-process [`DetectionService`] backed by per-stream detection lists.
///
/// Published references become `robot_frame → label` edges in the shared
/// [`TfBuffer`], so a navigation goal can later target the entity by name.
#[derive(Debug)]
pub struct DetectionBoard {
    tf: TfBuffer,
    robot_frame: String,
    active: RwLock<HashSet<DetectorStream>>,
    detections: RwLock<HashMap<DetectorStream, Vec<DetectionRecord>>>,
}

impl DetectionBoard {
    pub fn new(tf: TfBuffer, robot_frame: impl Into<String>) -> Self {
        Self {
            tf,
            robot_frame: robot_frame.into(),
            active: RwLock::new(HashSet::new()),
            detections: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the current detections reported by `stream`.
    pub fn update(&self, stream: DetectorStream, detections: Vec<DetectionRecord>) {
        let mut board = match self.detections.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        board.insert(stream, detections);
    }

    pub fn is_active(&self, stream: DetectorStream) -> bool {
        match self.active.read() {
            Ok(active) => active.contains(&stream),
            Err(poisoned) => poisoned.into_inner().contains(&stream),
        }
    }

    fn matches(template: &DetectionRecord, candidate: &DetectionRecord, threshold: f64) -> bool {
        (template.class_name.is_empty() || template.class_name == candidate.class_name)
            && candidate.confidence >= threshold
            && candidate.center.x.is_finite()
            && candidate.center.y.is_finite()
            && candidate.center.z.is_finite()
    }

    fn rank(a: &DetectionRecord, b: &DetectionRecord) -> Ordering {
        let range = |d: &DetectionRecord| d.center.x.hypot(d.center.y);
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| range(a).total_cmp(&range(b)))
    }
}

impl DetectionService for DetectionBoard {
    fn activate(&self, stream: DetectorStream) {
        let mut active = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if active.insert(stream) {
            debug!(activation = stream.activation_name(), "detector stream activated");
        }
    }

    fn query(&self, template: &DetectionRecord, confidence_threshold: f64) -> Vec<DetectionRecord> {
        let active: Vec<DetectorStream> = match self.active.read() {
            Ok(guard) => guard.iter().copied().collect(),
            Err(poisoned) => poisoned.into_inner().iter().copied().collect(),
        };
        let board = match self.detections.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut found: Vec<DetectionRecord> = active
            .iter()
            .filter_map(|stream| board.get(stream))
            .flatten()
            .filter(|d| Self::matches(template, d, confidence_threshold))
            .cloned()
            .collect();
        found.sort_by(Self::rank);
        found
    }

    fn publish_reference(&self, detection: &DetectionRecord, label: &str) {
        self.tf.set_transform(
            &self.robot_frame,
            label,
            Transform3D::new(detection.center, Quaternion::identity()),
        );
        debug!(frame = label, parent = %self.robot_frame, "published detection frame");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::FrameLookup;
    use navgate_types::Vec3;

    fn person(x: f64, y: f64, confidence: f64) -> DetectionRecord {
        DetectionRecord::new("person", Vec3::new(x, y, 0.0), confidence)
    }

    fn board() -> DetectionBoard {
        DetectionBoard::new(TfBuffer::new(), "base_link")
    }

    #[test]
    fn from_what_selects_streams() {
        assert_eq!(DetectorStream::from_what("person"), DetectorStream::People);
        assert_eq!(DetectorStream::from_what("object"), DetectorStream::Objects);
    }

    #[test]
    fn from_what_unknown_falls_back_to_objects() {
        assert_eq!(DetectorStream::from_what("chair"), DetectorStream::Objects);
        assert_eq!(DetectorStream::from_what(""), DetectorStream::Objects);
    }

    #[test]
    fn inactive_stream_yields_nothing() {
        let board = board();
        board.update(DetectorStream::People, vec![person(1.0, 0.0, 0.9)]);
        assert!(board.query(&person(0.0, 0.0, 0.0), 0.5).is_empty());
    }

    #[test]
    fn query_filters_by_threshold_and_class() {
        let board = board();
        board.activate(DetectorStream::People);
        board.activate(DetectorStream::Objects);
        board.update(DetectorStream::People, vec![person(1.0, 0.0, 0.9), person(2.0, 0.0, 0.3)]);
        board.update(
            DetectorStream::Objects,
            vec![DetectionRecord::new("cup", Vec3::new(0.5, 0.0, 0.0), 0.95)],
        );

        let found = board.query(&person(0.0, 0.0, 0.0), 0.5);
        assert_eq!(found, vec![person(1.0, 0.0, 0.9)]);
    }

    #[test]
    fn empty_template_class_matches_everything() {
        let board = board();
        board.activate(DetectorStream::Objects);
        board.update(
            DetectorStream::Objects,
            vec![
                DetectionRecord::new("cup", Vec3::new(1.0, 0.0, 0.0), 0.6),
                DetectionRecord::new("bottle", Vec3::new(1.0, 0.0, 0.0), 0.7),
            ],
        );
        let template = DetectionRecord::new("", Vec3::zero(), 0.0);
        assert_eq!(board.query(&template, 0.5).len(), 2);
    }

    #[test]
    fn query_ranks_by_confidence_then_range() {
        let board = board();
        board.activate(DetectorStream::People);
        board.update(
            DetectorStream::People,
            vec![person(3.0, 0.0, 0.8), person(1.0, 0.0, 0.8), person(5.0, 0.0, 0.95)],
        );

        let found = board.query(&person(0.0, 0.0, 0.0), 0.0);
        assert_eq!(found[0], person(5.0, 0.0, 0.95));
        assert_eq!(found[1], person(1.0, 0.0, 0.8));
        assert_eq!(found[2], person(3.0, 0.0, 0.8));
    }

    #[test]
    fn nan_centres_never_match_and_ranking_holds() {
        let board = board();
        board.activate(DetectorStream::People);
        let detections: Vec<DetectionRecord> = (0..64)
            .map(|i| {
                let x = if i % 3 == 0 { f64::NAN } else { 1.0 + f64::from(i) * 0.1 };
                person(x, 0.0, 0.9)
            })
            .collect();
        board.update(DetectorStream::People, detections);

        let found = board.query(&person(0.0, 0.0, 0.0), 0.5);
        assert_eq!(found.len(), 42);
        assert!(found.iter().all(|d| d.center.x.is_finite()));
        assert!(found.windows(2).all(|w| w[0].center.x <= w[1].center.x));
    }

    #[test]
    fn publish_reference_adds_robot_relative_frame() {
        let tf = TfBuffer::new();
        let board = DetectionBoard::new(tf.clone(), "base_link");
        board.publish_reference(&person(2.0, 0.5, 0.9), "operator");
        // Idempotent: republishing replaces the frame.
        board.publish_reference(&person(2.0, 0.5, 0.9), "operator");

        let t = tf.lookup("base_link", "operator").unwrap();
        assert_eq!(t.translation, Vec3::new(2.0, 0.5, 0.0));
        assert_eq!(t.rotation, Quaternion::identity());
    }
}
