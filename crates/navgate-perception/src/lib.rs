//! `navgate-perception` – frames and detections.
//!
//! The two perception-side collaborators the decision nodes consume.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine] /
//!   [`TfBuffer`][transform::TfBuffer]: directed graph of named reference
//!   frames, queried through the [`FrameLookup`][transform::FrameLookup]
//!   trait.
//! - [`detection`] – [`DetectionBoard`][detection::DetectionBoard]: ranked,
//!   confidence-filtered detection queries behind the
//!   [`DetectionService`][detection::DetectionService] trait, plus publication
//!   of detected entities as named frames.

pub mod detection;
pub mod transform;

pub use detection::{DetectionBoard, DetectionService, DetectorStream};
pub use transform::{FrameLookup, TfBuffer, TfEngine, Transform3D, TransformError};
