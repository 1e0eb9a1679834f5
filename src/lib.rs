//! # tiledet
//!
//! Tiled heatmap text detection for images of any height.
//!
//! Detection models take a fixed input window. Tall pages are cut into
//! window-height strips, strips from several pages share a model call under a
//! tile budget, and the per-strip heatmaps are stitched back into one heatmap
//! per page before region boxes and vertical separator lines are extracted.
//!
//! ## Features
//!
//! - Tile-budget batch planning that never splits an image
//! - Inference overlapped with post-processing through a bounded queue
//! - Optional parallel geometry extraction with stable result order
//! - Pluggable model and geometry extractor
//! - ONNX Runtime integration (feature `onnx`)
//!
//! ## Modules
//!
//! * [`core`] - Batch planning, configuration, errors and the model seam
//! * [`pipeline`] - Producer/consumer coordination, results and statistics
//! * [`predictor`] - The [`TextDetector`](predictor::TextDetector) facade
//! * [`processors`] - Tiling, normalization, resampling, reassembly and geometry
//! * [`utils`] - Image loading helpers
//!
//! ## Quick Start
//!
//! ```rust
//! use tiledet::prelude::*;
//! use ndarray::s;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Any function from a tile batch to heatmaps works as a model.
//! let model = |batch: &Tensor4D| -> PipelineResult<ModelOutput> {
//!     Ok(batch.slice(s![.., ..2, .., ..]).to_owned().into_dyn())
//! };
//!
//! let detector = TextDetector::builder()
//!     .model(model)
//!     .settings(DetectorSettings::default().with_input_size(64, 64))
//!     .build()?;
//!
//! let page = image::DynamicImage::new_rgb8(100, 150);
//! let results = detector.detect(&[page])?;
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].image_bbox, [0.0, 0.0, 100.0, 150.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```rust
//! use tiledet::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings: DetectorSettings = serde_json::from_str(r#"
//! {
//!   "device": "cuda",
//!   "input_size": [1024, 1024],
//!   "parallel": { "cpu_workers": 4 },
//!   "geometry": { "text_threshold": 0.7 }
//! }
//! "#)?;
//! assert_eq!(settings.effective_batch_size(), 36);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use tiledet::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - The detector and its settings (`TextDetector`, `DetectorSettings`)
/// - The model and extractor seams (`HeatmapModel`, `GeometryExtractor`)
/// - Results (`DetectionResult`, `TextBox`, `VerticalLine`, `PipelineStats`)
/// - Essential error and result types (`PipelineError`, `PipelineResult`)
/// - Basic image loading (`load_image`, `load_images`)
///
/// For lower-level stages (tiling, planning, reassembly), import directly
/// from `tiledet::processors` or `tiledet::core`.
pub mod prelude {
    // Detector (essential)
    pub use crate::core::{DetectorSettings, DeviceKind, ParallelPolicy};
    pub use crate::predictor::{TextDetector, TextDetectorBuilder};

    // Seams
    pub use crate::core::{HeatmapModel, ModelOutput, Tensor4D};
    pub use crate::processors::{GeometryExtractor, HeatmapGeometryConfig};

    // Results
    pub use crate::pipeline::{DetectionResult, PipelineStats, TextBox, VerticalLine};

    // Error Handling (essential)
    pub use crate::core::{PipelineError, PipelineResult};

    // Image Utility (minimal)
    pub use crate::utils::{load_image, load_images};
}
