//! Error types for the detection pipeline.
//!
//! This module defines the errors that can occur while tiling, batching,
//! running inference, reassembling heatmaps and extracting geometry.

use thiserror::Error;

/// Enum representing different stages of processing in the detection pipeline.
///
/// This enum is used to identify which stage of the pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tile normalization.
    Normalization,
    /// Error occurred while resampling model output to the canonical size.
    Resample,
    /// Error occurred while stitching tile heatmaps back together.
    Reassembly,
    /// Error occurred during batch processing.
    BatchProcessing,
    /// Error occurred during geometry extraction.
    PostProcessing,
    /// Error occurred during tensor operations.
    TensorOperation,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resample => write!(f, "resample"),
            ProcessingStage::Reassembly => write!(f, "reassembly"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
        }
    }
}

/// A plain message error used as the `source` of wrapped failures.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

/// Enum representing the errors that can occur in the detection pipeline.
///
/// Every failure aborts the whole run: there is no per-image isolation, so a
/// caller either receives one result per input image or one of these errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error reported by the model while running a batch.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// A pipeline thread panicked.
    #[error("{stage} thread panicked: {message}")]
    WorkerPanic {
        /// Which side of the pipeline panicked.
        stage: &'static str,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The batch queue was closed before the end-of-stream marker arrived.
    #[error("batch queue closed unexpectedly: {context}")]
    QueueClosed {
        /// What the closing side was doing.
        context: String,
    },

    /// Error from tensor shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// Error from the ONNX Runtime session.
    #[cfg(feature = "onnx")]
    #[error(transparent)]
    Session(#[from] ort::Error),
}

impl From<image::ImageError> for PipelineError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for PipelineError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}
