//! Image and heatmap processing stages.
//!
//! # Modules
//!
//! * `tiling` - Cutting images into model-window tiles
//! * `normalization` - Turning tiles into normalized CHW tensors
//! * `resample` - Bilinear resampling of model output
//! * `reassembly` - Stitching tile heatmaps back into whole-image heatmaps
//! * `heatmap_postprocess` - Converting heatmaps into boxes and lines
//! * `geometry` - Geometric primitives shared by the stages

mod geometry;
pub mod heatmap_postprocess;
mod normalization;
pub mod reassembly;
pub mod resample;
pub mod tiling;

pub use geometry::*;
pub use heatmap_postprocess::{
    GeometryExtractor, HeatmapGeometryConfig, HeatmapGeometryExtractor, heatmap_to_gray,
};
pub use normalization::*;
pub use reassembly::{HeatmapSet, ReassembledPrediction, TileReassembler};
pub use resample::resize_bilinear;
pub use tiling::{Tile, TileMeta, Tiler, count_tiles};
