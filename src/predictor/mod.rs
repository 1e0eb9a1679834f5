//! Detector facade.
//!
//! This module contains the user-facing text detector and its builder.

/// Tiled heatmap text detection over whole images
pub mod text_detector;

pub use text_detector::{InferenceStream, TextDetector, TextDetectorBuilder};
