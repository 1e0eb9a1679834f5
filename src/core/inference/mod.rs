//! The model seam and the adapter around it.
//!
//! Anything that maps a batch of normalized tiles to heatmaps can serve as the
//! detection model: an ONNX Runtime session (feature `onnx`), a closure in
//! tests, or a user type implementing [`HeatmapModel`].

pub mod adapter;
#[cfg(feature = "onnx")]
pub mod ort_infer;

pub use adapter::InferenceAdapter;
#[cfg(feature = "onnx")]
pub use ort_infer::OrtHeatmapModel;

use ndarray::ArrayD;

use crate::core::Tensor4D;
use crate::core::errors::PipelineResult;

/// Raw model output. The adapter checks it is `[tiles, channels, rows, cols]`.
pub type ModelOutput = ArrayD<f32>;

/// A detection model.
///
/// `infer` receives `[tiles, 3, window_height, window_width]` and returns
/// per-tile heatmaps. Errors are passed to the caller untouched.
pub trait HeatmapModel: Send + Sync {
    fn infer(&self, batch: &Tensor4D) -> PipelineResult<ModelOutput>;

    /// Name used in logs and error messages.
    fn model_name(&self) -> &str {
        "heatmap_model"
    }
}

impl<F> HeatmapModel for F
where
    F: Fn(&Tensor4D) -> PipelineResult<ModelOutput> + Send + Sync,
{
    fn infer(&self, batch: &Tensor4D) -> PipelineResult<ModelOutput> {
        self(batch)
    }
}
