//! Error constructor utilities for the detection pipeline.
//!
//! These helpers keep call sites short while still attaching the processing
//! stage and the underlying error.
//!
//! ```rust
//! use tiledet::core::PipelineError;
//!
//! let error = PipelineError::batch_item_error(
//!     "geometry extraction",
//!     2,
//!     3,
//!     std::io::Error::new(std::io::ErrorKind::Other, "bad heatmap"),
//! );
//! assert_eq!(
//!     error.to_string(),
//!     "batch processing failed: geometry extraction failed in batch 2 (image 3)"
//! );
//! ```

use super::types::{PipelineError, ProcessingStage, SimpleError};

impl PipelineError {
    /// Internal helper to build a Processing error with minimal boilerplate.
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for tensor operations with shape details.
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the tensor operation.
    /// * `expected_shape` - The shape the operation required.
    /// * `actual_shape` - The shape it received.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn tensor_operation_error(
        operation: &str,
        expected_shape: &[usize],
        actual_shape: &[usize],
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(
            ProcessingStage::TensorOperation,
            format!(
                "{operation}: expected shape {expected_shape:?}, got {actual_shape:?} ({context})"
            ),
            error,
        )
    }

    /// Creates an error for tile normalization.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Normalization, context, error)
    }

    /// Creates an error for heatmap resampling.
    pub fn resample(context: &str, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::processing_with_context(ProcessingStage::Resample, context, error)
    }

    /// Creates an error for tile reassembly from a plain message.
    pub fn reassembly(context: impl Into<String>) -> Self {
        let context = context.into();
        Self::processing_with_context(
            ProcessingStage::Reassembly,
            context.clone(),
            SimpleError::new(context),
        )
    }

    /// Creates an error for geometry extraction.
    pub fn post_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::PostProcessing, context, error)
    }

    /// Creates an error for batch processing operations.
    pub fn batch_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::BatchProcessing, context, error)
    }

    /// Creates a standardized error for one image inside a batch.
    ///
    /// # Arguments
    ///
    /// * `stage_name` - The stage that failed (e.g. "geometry extraction").
    /// * `batch_index` - Index of the batch in the plan.
    /// * `image_index` - Zero-based input index of the image.
    /// * `error` - The underlying error.
    pub fn batch_item_error(
        stage_name: &str,
        batch_index: usize,
        image_index: usize,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(
            ProcessingStage::BatchProcessing,
            format!("{stage_name} failed in batch {batch_index} (image {image_index})"),
            error,
        )
    }

    /// Creates an inference error carrying the model name.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the offending field and value.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates a validation error for a mismatched field.
    pub fn validation_error(component: &str, field: &str, expected: &str, actual: &str) -> Self {
        Self::InvalidInput {
            message: format!(
                "Validation failed in {}: field '{}' expected {}, but got '{}'",
                component, field, expected, actual
            ),
        }
    }

    /// Converts a thread panic payload into a pipeline error.
    pub fn worker_panic(stage: &'static str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::WorkerPanic { stage, message }
    }

    /// Creates an error for a queue that closed without an end-of-stream marker.
    pub fn queue_closed(context: impl Into<String>) -> Self {
        Self::QueueClosed {
            context: context.into(),
        }
    }
}
