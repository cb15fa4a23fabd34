//! [`BearingGate`] – is the target entity straight ahead?
//!
//! The gate takes the best detection matching a template and turns its
//! bearing into a steering hint:
//!
//! | Bearing | Verdict | `direction` | Status |
//! |---|---|---|---|
//! | no detection | [`DirectionalVerdict::TurnRight`] | −1 | Failure |
//! | `> +5°` | [`DirectionalVerdict::TurnLeft`] | +1 | Failure |
//! | `< −5°` | [`DirectionalVerdict::TurnRight`] | −1 | Failure |
//! | within ±5° (inclusive) | [`DirectionalVerdict::Aligned`] | 0 | Success |
//!
//! Positive bearings are to the robot's left (counter-clockwise from the
//! forward `x` axis).  An aligned detection is also published as a named
//! frame so later nodes can navigate to it.

use std::sync::Arc;

use navgate_perception::{DetectionService, DetectorStream};
use navgate_types::DetectionRecord;
use tracing::{debug, error};

use crate::behavior_tree::{NodeStatus, TreeNode};
use crate::ports::{Blackboard, PortMap};

/// Half-width of the forward cone, in degrees.
pub const ALIGNMENT_TOLERANCE_DEG: f64 = 5.0;

/// Steering hint produced by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionalVerdict {
    Aligned,
    TurnLeft,
    TurnRight,
}

impl DirectionalVerdict {
    /// Integer written to the `direction` output port.
    pub fn code(self) -> i32 {
        match self {
            DirectionalVerdict::Aligned => 0,
            DirectionalVerdict::TurnLeft => 1,
            DirectionalVerdict::TurnRight => -1,
        }
    }

    pub fn passed(self) -> bool {
        self == DirectionalVerdict::Aligned
    }

    pub fn status(self) -> NodeStatus {
        if self.passed() {
            NodeStatus::Success
        } else {
            NodeStatus::Failure
        }
    }
}

/// Verdict for a bearing in degrees.  Exactly ±5° is still aligned.  A
/// non-finite bearing is treated like nothing seen.
pub fn verdict_for_bearing(bearing_deg: f64) -> DirectionalVerdict {
    if !bearing_deg.is_finite() {
        DirectionalVerdict::TurnRight
    } else if bearing_deg.abs() > ALIGNMENT_TOLERANCE_DEG {
        if bearing_deg > 0.0 {
            DirectionalVerdict::TurnLeft
        } else {
            DirectionalVerdict::TurnRight
        }
    } else {
        DirectionalVerdict::Aligned
    }
}

/// Verdict for a ranked detection list; only the head is consulted.
pub fn classify(detections: &[DetectionRecord]) -> DirectionalVerdict {
    match detections.first() {
        // Nothing seen: default to turning right.
        None => DirectionalVerdict::TurnRight,
        Some(best) => verdict_for_bearing(best.bearing_deg()),
    }
}

/// Stateless gate over an injected [`DetectionService`].
pub struct BearingGate {
    detections: Arc<dyn DetectionService>,
}

impl BearingGate {
    pub fn new(detections: Arc<dyn DetectionService>) -> Self {
        Self { detections }
    }

    /// Query the detections matching `template` and classify the best one.
    /// When aligned, the detection is published as frame `entity`.
    pub fn evaluate(&self, template: &DetectionRecord, confidence_threshold: f64, entity: &str) -> DirectionalVerdict {
        let found = self.detections.query(template, confidence_threshold);
        let verdict = classify(&found);
        match found.first() {
            None => error!(class = %template.class_name, confidence_threshold, "no detections found"),
            Some(best) => {
                debug!(class = %best.class_name, bearing = best.bearing_deg(), ?verdict, "bearing evaluated");
                if verdict.passed() {
                    self.detections.publish_reference(best, entity);
                }
            }
        }
        verdict
    }
}

/// Behavior tree condition wrapping [`BearingGate`].
///
/// Ports:
/// - `what` (read once, at construction): `"person"` or `"object"`, the
///   detector stream to switch on.
/// - `target`: name of the blackboard entry holding the template
///   [`DetectionRecord`].
/// - `confidence`: minimum detection confidence, default `0.0`.
/// - `entity_to_identify`: frame name for an aligned detection, default
///   `"entity"`.
/// - `direction` (output): the verdict code.
pub struct IsInFront {
    name: String,
    ports: PortMap,
    gate: BearingGate,
}

impl IsInFront {
    /// Build the node and activate the detector stream named by `what`.
    pub fn new(
        name: impl Into<String>,
        ports: PortMap,
        detections: Arc<dyn DetectionService>,
        blackboard: &Blackboard,
    ) -> Self {
        let name = name.into();
        let what = match ports.input::<String>("what", blackboard) {
            Ok(what) => what.unwrap_or_default(),
            Err(e) => {
                error!(node = %name, error = %e, "unreadable 'what' port");
                String::new()
            }
        };
        detections.activate(DetectorStream::from_what(&what));
        Self {
            name,
            ports,
            gate: BearingGate::new(detections),
        }
    }

    fn fail(&self, blackboard: &mut Blackboard, reason: &str) -> NodeStatus {
        error!(node = %self.name, reason, "IsInFront cannot evaluate");
        self.write_direction(blackboard, DirectionalVerdict::TurnRight);
        NodeStatus::Failure
    }

    fn write_direction(&self, blackboard: &mut Blackboard, verdict: DirectionalVerdict) {
        if let Err(e) = self.ports.output("direction", blackboard, verdict.code()) {
            error!(node = %self.name, error = %e, "cannot write direction");
        }
    }

    fn template(&self, blackboard: &Blackboard) -> Result<DetectionRecord, String> {
        let key = self
            .ports
            .input::<String>("target", blackboard)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "target port is not bound".to_string())?;
        blackboard
            .get::<DetectionRecord>(&key)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no target detection under '{key}'"))
    }
}

impl TreeNode for IsInFront {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        debug!(node = %self.name, "IsInFront ticked");
        let template = match self.template(blackboard) {
            Ok(template) => template,
            Err(reason) => return self.fail(blackboard, &reason),
        };
        let confidence = match self.ports.input_or("confidence", blackboard, 0.0) {
            Ok(confidence) => confidence,
            Err(e) => return self.fail(blackboard, &e.to_string()),
        };
        let entity = match self.ports.input_or("entity_to_identify", blackboard, "entity".to_string()) {
            Ok(entity) => entity,
            Err(e) => return self.fail(blackboard, &e.to_string()),
        };

        let verdict = self.gate.evaluate(&template, confidence, &entity);
        self.write_direction(blackboard, verdict);
        verdict.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navgate_perception::{DetectionBoard, FrameLookup, TfBuffer};
    use navgate_types::Vec3;

    /// A detection at `bearing_deg`, two metres out.
    fn at_bearing(bearing_deg: f64) -> DetectionRecord {
        let rad = bearing_deg.to_radians();
        DetectionRecord::new("person", Vec3::new(2.0 * rad.cos(), 2.0 * rad.sin(), 0.0), 0.9)
    }

    fn world() -> (TfBuffer, Arc<DetectionBoard>) {
        let tf = TfBuffer::new();
        let board = Arc::new(DetectionBoard::new(tf.clone(), "base_link"));
        (tf, board)
    }

    fn person_template() -> DetectionRecord {
        DetectionRecord::new("person", Vec3::zero(), 0.0)
    }

    #[test]
    fn empty_list_turns_right_and_fails() {
        let verdict = classify(&[]);
        assert_eq!(verdict, DirectionalVerdict::TurnRight);
        assert_eq!(verdict.code(), -1);
        assert!(!verdict.passed());
    }

    #[test]
    fn straight_ahead_is_aligned() {
        let verdict = classify(&[at_bearing(0.0)]);
        assert_eq!((verdict.passed(), verdict.code()), (true, 0));
    }

    #[test]
    fn left_and_right_of_the_cone() {
        assert_eq!(classify(&[at_bearing(10.0)]).code(), 1);
        assert_eq!(classify(&[at_bearing(-10.0)]).code(), -1);
        assert!(!classify(&[at_bearing(10.0)]).passed());
        assert!(!classify(&[at_bearing(-10.0)]).passed());
    }

    #[test]
    fn cone_edge_is_inclusive() {
        assert_eq!(verdict_for_bearing(5.0), DirectionalVerdict::Aligned);
        assert_eq!(verdict_for_bearing(-5.0), DirectionalVerdict::Aligned);
        assert_eq!(verdict_for_bearing(5.0001), DirectionalVerdict::TurnLeft);
        assert_eq!(verdict_for_bearing(-5.0001), DirectionalVerdict::TurnRight);
    }

    #[test]
    fn non_finite_bearing_is_never_aligned() {
        assert_eq!(verdict_for_bearing(f64::NAN), DirectionalVerdict::TurnRight);
        assert_eq!(verdict_for_bearing(f64::INFINITY), DirectionalVerdict::TurnRight);
        let blind = DetectionRecord::new("person", Vec3::new(f64::NAN, 0.0, 0.0), 0.9);
        assert!(!classify(&[blind, at_bearing(0.0)]).passed());
    }

    /// Serves a fixed list as-is and records every published label.
    struct FixedDetections {
        found: Vec<DetectionRecord>,
        published: std::sync::Mutex<Vec<String>>,
    }

    impl DetectionService for FixedDetections {
        fn activate(&self, _stream: DetectorStream) {}

        fn query(&self, _template: &DetectionRecord, _confidence_threshold: f64) -> Vec<DetectionRecord> {
            self.found.clone()
        }

        fn publish_reference(&self, _detection: &DetectionRecord, label: &str) {
            self.published.lock().unwrap().push(label.to_string());
        }
    }

    #[test]
    fn non_finite_head_is_not_published() {
        let service = Arc::new(FixedDetections {
            found: vec![DetectionRecord::new("person", Vec3::new(f64::NAN, 0.0, 0.0), 0.9)],
            published: std::sync::Mutex::new(Vec::new()),
        });
        let gate = BearingGate::new(service.clone());

        assert_eq!(gate.evaluate(&person_template(), 0.5, "visitor"), DirectionalVerdict::TurnRight);
        assert!(service.published.lock().unwrap().is_empty());
    }

    #[test]
    fn board_skips_nan_detection_in_favour_of_a_real_one() {
        let (tf, board) = world();
        board.activate(DetectorStream::People);
        board.update(
            DetectorStream::People,
            vec![DetectionRecord::new("person", Vec3::new(f64::NAN, 0.0, 0.0), 0.99), at_bearing(2.0)],
        );
        let gate = BearingGate::new(board);

        assert_eq!(gate.evaluate(&person_template(), 0.5, "visitor"), DirectionalVerdict::Aligned);
        let t = tf.lookup("base_link", "visitor").unwrap();
        assert!(t.translation.x.is_finite());
    }

    #[test]
    fn only_the_head_detection_counts() {
        assert!(classify(&[at_bearing(1.0), at_bearing(40.0)]).passed());
        assert_eq!(classify(&[at_bearing(-40.0), at_bearing(0.0)]).code(), -1);
    }

    #[test]
    fn aligned_detection_is_published_as_frame() {
        let (tf, board) = world();
        board.activate(DetectorStream::People);
        board.update(DetectorStream::People, vec![at_bearing(2.0)]);
        let gate = BearingGate::new(board);

        assert_eq!(gate.evaluate(&person_template(), 0.5, "visitor"), DirectionalVerdict::Aligned);
        assert!(tf.has_frame("visitor"));
        assert!(tf.lookup("base_link", "visitor").is_ok());
    }

    #[test]
    fn misaligned_detection_is_not_published() {
        let (tf, board) = world();
        board.activate(DetectorStream::People);
        board.update(DetectorStream::People, vec![at_bearing(30.0)]);
        let gate = BearingGate::new(board);

        assert_eq!(gate.evaluate(&person_template(), 0.5, "visitor"), DirectionalVerdict::TurnLeft);
        assert!(!tf.has_frame("visitor"));
    }

    #[test]
    fn threshold_filters_before_classifying() {
        let (_, board) = world();
        board.activate(DetectorStream::People);
        board.update(DetectorStream::People, vec![at_bearing(0.0)]);
        let gate = BearingGate::new(board);
        assert_eq!(gate.evaluate(&person_template(), 0.95, "visitor"), DirectionalVerdict::TurnRight);
    }

    fn is_in_front(board: &Arc<DetectionBoard>, what: &str) -> IsInFront {
        let ports = PortMap::new()
            .with("what", what)
            .with("target", "person_template")
            .with("confidence", 0.5)
            .with("entity_to_identify", "visitor")
            .with("direction", "{turn}");
        IsInFront::new("is_in_front", ports, board.clone(), &Blackboard::new())
    }

    #[test]
    fn construction_activates_requested_stream() {
        let (_, board) = world();
        is_in_front(&board, "person");
        assert!(board.is_active(DetectorStream::People));
        assert!(!board.is_active(DetectorStream::Objects));
    }

    #[test]
    fn unknown_what_falls_back_to_objects() {
        let (_, board) = world();
        is_in_front(&board, "robot");
        assert!(board.is_active(DetectorStream::Objects));
        assert!(!board.is_active(DetectorStream::People));
    }

    #[test]
    fn node_writes_direction_and_status() {
        let (_, board) = world();
        let mut node = is_in_front(&board, "person");
        let mut bb = Blackboard::new();
        bb.set("person_template", person_template()).unwrap();

        assert_eq!(node.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(bb.get::<i32>("turn").unwrap(), Some(-1));

        board.update(DetectorStream::People, vec![at_bearing(-12.0)]);
        assert_eq!(node.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(bb.get::<i32>("turn").unwrap(), Some(-1));

        board.update(DetectorStream::People, vec![at_bearing(12.0)]);
        assert_eq!(node.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(bb.get::<i32>("turn").unwrap(), Some(1));

        board.update(DetectorStream::People, vec![at_bearing(0.0)]);
        assert_eq!(node.tick(&mut bb), NodeStatus::Success);
        assert_eq!(bb.get::<i32>("turn").unwrap(), Some(0));
    }

    #[test]
    fn missing_target_entry_fails_turning_right() {
        let (_, board) = world();
        board.update(DetectorStream::People, vec![at_bearing(0.0)]);
        let mut node = is_in_front(&board, "person");
        let mut bb = Blackboard::new();

        assert_eq!(node.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(bb.get::<i32>("turn").unwrap(), Some(-1));
    }
}
