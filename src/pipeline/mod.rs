//! The streaming detection pipeline.
//!
//! This module connects inference and geometry extraction through a bounded
//! queue and defines the per-image results and run statistics it produces.

pub mod coordinator;
pub mod result;
pub mod stats;

pub use coordinator::{PipelineCoordinator, PredictionBatch};
pub use result::{DetectionResult, TextBox, VerticalLine};
pub use stats::{PipelineStats, PostprocessStrategy};
