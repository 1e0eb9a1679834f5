//! Batch processing utilities for the detection pipeline.
//!
//! This module holds the tensor aliases shared by the pipeline and the tile
//! budget planner that decides which images run through the model together.

pub mod planner;

pub use planner::{BatchPlan, BatchPlanner, ImageBatch};

/// A 4-dimensional tensor represented as a 4D array of f32 values.
///
/// Batches of tiles are laid out as `[tiles, channels, height, width]`.
pub type Tensor4D = ndarray::Array4<f32>;
