//! The core module of the detection pipeline.
//!
//! This module contains the pieces every stage builds on:
//! - Tile-budget batch planning and tensor aliases
//! - Configuration management
//! - Constants used throughout the pipeline
//! - Error handling
//! - The model seam and inference adapter
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

pub use batch::{BatchPlan, BatchPlanner, ImageBatch, Tensor4D};
pub use config::{
    ConfigError, ConfigValidator, ConfigValidatorExt, DetectorSettings, DeviceKind,
    NormalizationConfig, ParallelPolicy,
};
pub use constants::*;
pub use errors::{PipelineError, PipelineResult, ProcessingStage};
pub use inference::{HeatmapModel, InferenceAdapter, ModelOutput};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
