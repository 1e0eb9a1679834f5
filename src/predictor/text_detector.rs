//! Text detection over whole images.
//!
//! This module provides [`TextDetector`], which ties the stages together:
//! images are tiled, planned into batches under the tile budget, run through
//! the model, reassembled, and handed to the geometry extractor by the
//! pipeline coordinator.
//!
//! The main components are:
//! - `TextDetector`: The detector
//! - `TextDetectorBuilder`: Builder for creating detector instances
//! - `InferenceStream`: The pull-based producer side of a run

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GenericImageView, RgbImage};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::config::{ConfigValidatorExt, DetectorSettings};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::{BatchPlan, BatchPlanner, HeatmapModel, ImageBatch, InferenceAdapter};
use crate::pipeline::{DetectionResult, PipelineCoordinator, PipelineStats, PredictionBatch};
use crate::processors::{
    GeometryExtractor, HeatmapGeometryExtractor, NormalizeImage, Tile, TileMeta, TileReassembler,
    Tiler,
};
use crate::utils::{load_images, to_rgb};

/// Detects text regions and vertical lines in images of any height.
#[derive(Clone)]
pub struct TextDetector {
    model: Arc<dyn HeatmapModel>,
    extractor: Arc<dyn GeometryExtractor>,
    settings: DetectorSettings,
    tiler: Tiler,
    normalizer: NormalizeImage,
    planner: BatchPlanner,
}

impl std::fmt::Debug for TextDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDetector")
            .field("model", &self.model.model_name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TextDetector {
    /// Starts building a detector.
    pub fn builder() -> TextDetectorBuilder {
        TextDetectorBuilder::new()
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Tile budget per model call.
    pub fn batch_size(&self) -> usize {
        self.planner.max_tiles_per_batch()
    }

    /// Detects text in every image, returning one result per image in order.
    pub fn detect(&self, images: &[DynamicImage]) -> PipelineResult<Vec<DetectionResult>> {
        self.detect_with_stats(images).map(|(results, _)| results)
    }

    /// Loads images from disk and detects text in them.
    pub fn detect_paths<P: AsRef<Path> + Sync>(
        &self,
        paths: &[P],
    ) -> PipelineResult<Vec<DetectionResult>> {
        let images = load_images(paths)?;
        self.detect(&images)
    }

    /// Like [`detect`](Self::detect), also returning run statistics.
    ///
    /// # Errors
    ///
    /// Zero-sized images are rejected before any model call. Model, extractor
    /// and worker failures abort the run; no partial output is returned.
    pub fn detect_with_stats(
        &self,
        images: &[DynamicImage],
    ) -> PipelineResult<(Vec<DetectionResult>, PipelineStats)> {
        for (index, image) in images.iter().enumerate() {
            if image.width() == 0 || image.height() == 0 {
                return Err(PipelineError::invalid_input(format!(
                    "image {index} has zero size ({}x{})",
                    image.width(),
                    image.height()
                )));
            }
        }
        if images.is_empty() {
            return Ok((Vec::new(), PipelineStats::default()));
        }

        let original_sizes: Vec<(u32, u32)> = images.iter().map(|img| img.dimensions()).collect();
        let tiles_per_image: Vec<usize> = original_sizes
            .iter()
            .map(|&(_, height)| self.tiler.count_tiles(height))
            .collect();
        let total_batches = self.planner.plan(tiles_per_image.clone()).count();

        info!(
            images = images.len(),
            tiles = tiles_per_image.iter().sum::<usize>(),
            batches = total_batches,
            budget = self.planner.max_tiles_per_batch(),
            "starting text detection"
        );

        let stream = InferenceStream {
            plan: self.planner.plan(tiles_per_image),
            total_batches,
            budget: self.planner.max_tiles_per_batch(),
            images,
            original_sizes: &original_sizes,
            tiler: self.tiler,
            normalizer: &self.normalizer,
            adapter: InferenceAdapter::new(
                self.model.as_ref(),
                self.settings.input_size,
                self.settings.heatmap_count,
            ),
            reassembler: TileReassembler::new(self.settings.heatmap_count),
        };

        let coordinator = PipelineCoordinator::new(
            self.extractor.as_ref(),
            self.settings.parallel.clone(),
            self.settings.queue_capacity,
        )?;
        coordinator.run(stream, images.len())
    }
}

/// Pull-based source of reassembled batches.
///
/// Each `next` plans one batch, tiles and normalizes its images, runs the
/// model and reassembles the output.
pub struct InferenceStream<'a> {
    plan: BatchPlan,
    total_batches: usize,
    budget: usize,
    images: &'a [DynamicImage],
    original_sizes: &'a [(u32, u32)],
    tiler: Tiler,
    normalizer: &'a NormalizeImage,
    adapter: InferenceAdapter<'a>,
    reassembler: TileReassembler,
}

impl InferenceStream<'_> {
    fn run_batch(&self, batch: ImageBatch) -> PipelineResult<PredictionBatch> {
        let started = Instant::now();
        debug!(
            batch = batch.batch_index + 1,
            total = self.total_batches,
            images = batch.len(),
            tiles = batch.tile_count,
            "Detecting bboxes"
        );
        let oversized = batch.is_oversized(self.budget);
        if oversized {
            warn!(
                image_index = batch.image_indices.start,
                tiles = batch.tile_count,
                budget = self.budget,
                "image exceeds the tile budget, running it alone"
            );
        }

        let per_image: Vec<Vec<Tile>> = batch
            .image_indices
            .clone()
            .into_par_iter()
            .map(|index| {
                // Converted per batch so only in-flight images hold an RGB copy.
                let rgb = to_rgb(&self.images[index]);
                self.tiler.tile(&rgb, index)
            })
            .collect::<PipelineResult<_>>()?;
        let tiles: Vec<Tile> = per_image.into_iter().flatten().collect();

        let tile_images: Vec<&RgbImage> = tiles.iter().map(|tile| &tile.image).collect();
        let tensor = self.normalizer.normalize_batch(&tile_images)?;
        let metas: Vec<TileMeta> = tiles.iter().map(|tile| tile.meta).collect();
        drop(tile_images);
        drop(tiles);

        let heatmaps = self.adapter.run(&tensor)?;
        let predictions = self
            .reassembler
            .reassemble(&heatmaps, &metas, self.original_sizes)?;

        Ok(PredictionBatch {
            batch_index: batch.batch_index,
            predictions,
            tile_count: metas.len(),
            oversized,
            inference_time: started.elapsed(),
        })
    }
}

impl Iterator for InferenceStream<'_> {
    type Item = PipelineResult<PredictionBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.plan.next()?;
        Some(self.run_batch(batch))
    }
}

/// Builder for [`TextDetector`].
#[derive(Default)]
pub struct TextDetectorBuilder {
    model: Option<Arc<dyn HeatmapModel>>,
    extractor: Option<Arc<dyn GeometryExtractor>>,
    settings: DetectorSettings,
}

impl TextDetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the detection model.
    pub fn model(mut self, model: impl HeatmapModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Sets a shared detection model.
    pub fn model_arc(mut self, model: Arc<dyn HeatmapModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Loads an ONNX model with `pool_size` sessions.
    #[cfg(feature = "onnx")]
    pub fn onnx_model(self, model_path: impl AsRef<Path>, pool_size: usize) -> PipelineResult<Self> {
        let model = crate::core::inference::OrtHeatmapModel::new(model_path, None, pool_size)?;
        Ok(self.model(model))
    }

    /// Replaces the default geometry extractor.
    pub fn extractor(mut self, extractor: impl GeometryExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    pub fn settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validates the settings and builds the detector.
    ///
    /// Without an explicit extractor, a [`HeatmapGeometryExtractor`] is built
    /// from `settings.geometry`.
    pub fn build(self) -> PipelineResult<TextDetector> {
        let settings = self.settings.validated()?;

        let model = self
            .model
            .ok_or_else(|| PipelineError::config_error("a detection model is required"))?;
        let extractor = self.extractor.unwrap_or_else(|| {
            Arc::new(HeatmapGeometryExtractor::new(settings.geometry.clone()))
        });

        let (window_width, window_height) = settings.input_size;
        let tiler = Tiler::new(window_width, window_height)?.with_pad_value(settings.pad_value);
        let normalizer = NormalizeImage::new(&settings.normalization)?;
        let planner = BatchPlanner::new(settings.effective_batch_size())?;

        debug!(
            model = model.model_name(),
            batch_size = planner.max_tiles_per_batch(),
            device = ?settings.device,
            "built text detector"
        );

        Ok(TextDetector {
            model,
            extractor,
            settings,
            tiler,
            normalizer,
            planner,
        })
    }
}
