//! Error types for the detection pipeline.
//!
//! This module provides the pipeline's error enum, the processing stage it
//! tags failures with, and helper constructors for building well-structured
//! errors with context and error chaining.
//!
//! # Usage
//!
//! ```rust
//! use tiledet::core::errors::{PipelineError, ProcessingStage};
//!
//! let error = PipelineError::reassembly("image 2: expected tile 1, got tile 3");
//! assert!(matches!(
//!     error,
//!     PipelineError::Processing { kind: ProcessingStage::Reassembly, .. }
//! ));
//! assert_eq!(
//!     error.to_string(),
//!     "reassembly failed: image 2: expected tile 1, got tile 3"
//! );
//!
//! let config_error = PipelineError::config_error("queue capacity must be positive");
//! assert!(config_error.to_string().contains("queue capacity"));
//! ```

pub mod constructors;
pub mod types;

pub use types::{PipelineError, ProcessingStage, SimpleError};

/// Convenient result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
