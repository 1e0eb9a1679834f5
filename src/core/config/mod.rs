//! Configuration management for the detection pipeline.
//!
//! This module provides settings types, validation traits, and the parallel
//! post-processing policy.

pub mod errors;
pub mod parallel;
pub mod settings;

pub use errors::{ConfigError, ConfigValidator, ConfigValidatorExt};
pub use parallel::ParallelPolicy;
pub use settings::{DetectorSettings, DeviceKind, NormalizationConfig};
