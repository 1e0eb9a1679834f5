//! Rebuilding per-image heatmaps from tile heatmaps.
//!
//! The model sees tiles, the geometry extractor needs whole images. Tiles of
//! one image arrive consecutively and top to bottom, so reassembly is a
//! single streaming pass: the first tile of an image opens an accumulator,
//! later tiles append their valid rows, and the accumulator is closed when
//! the next image starts.

use itertools::Itertools;
use ndarray::{Array2, ArrayView2, Axis, s};
use tracing::debug;

use crate::core::Tensor4D;
use crate::core::constants::{AFFINITY_CHANNEL, REGION_CHANNEL};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::processors::tiling::TileMeta;

/// Heatmaps of one image, full height, one entry per model channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapSet {
    channels: Vec<Array2<f32>>,
}

impl HeatmapSet {
    /// Wraps per-channel heatmaps. All channels must share one shape.
    pub fn new(channels: Vec<Array2<f32>>) -> PipelineResult<Self> {
        if let Some(first) = channels.first() {
            let shape = first.dim();
            if let Some(bad) = channels.iter().find(|c| c.dim() != shape) {
                return Err(PipelineError::reassembly(format!(
                    "heatmap channels differ in shape: {:?} vs {:?}",
                    shape,
                    bad.dim()
                )));
            }
        }
        Ok(Self { channels })
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// `(rows, columns)` of every channel.
    pub fn dim(&self) -> (usize, usize) {
        self.channels.first().map_or((0, 0), Array2::dim)
    }

    pub fn channel(&self, index: usize) -> Option<&Array2<f32>> {
        self.channels.get(index)
    }

    /// Text region score map.
    pub fn region(&self) -> Option<&Array2<f32>> {
        self.channel(REGION_CHANNEL)
    }

    /// Affinity (link) score map.
    pub fn affinity(&self) -> Option<&Array2<f32>> {
        self.channel(AFFINITY_CHANNEL)
    }

    pub fn into_channels(self) -> Vec<Array2<f32>> {
        self.channels
    }
}

/// Full-height prediction for one input image.
#[derive(Debug, Clone, PartialEq)]
pub struct ReassembledPrediction {
    /// Input index of the image.
    pub image_index: usize,
    pub heatmaps: HeatmapSet,
    /// `(width, height)` of the image before tiling.
    pub original_size: (u32, u32),
}

/// Concatenates tile heatmaps back into per-image heatmaps.
#[derive(Debug, Clone, Copy)]
pub struct TileReassembler {
    heatmap_count: usize,
}

impl TileReassembler {
    /// Creates a reassembler keeping the first `heatmap_count` channels.
    pub fn new(heatmap_count: usize) -> Self {
        Self { heatmap_count }
    }

    /// Rebuilds one prediction per image from a batch of tile heatmaps.
    ///
    /// `heatmaps` is `[tiles, channels, rows, cols]` in the same order as
    /// `metas`. `original_sizes` is indexed by input image index and must
    /// cover every image referenced by `metas`.
    ///
    /// # Errors
    ///
    /// Fails when tile and metadata counts differ, when the model produced too
    /// few channels, when tiles arrive out of order, or when the rows kept for
    /// an image do not add up to its original height.
    pub fn reassemble(
        &self,
        heatmaps: &Tensor4D,
        metas: &[TileMeta],
        original_sizes: &[(u32, u32)],
    ) -> PipelineResult<Vec<ReassembledPrediction>> {
        let (tiles, channels, rows, _) = heatmaps.dim();
        if tiles != metas.len() {
            return Err(PipelineError::reassembly(format!(
                "{tiles} tile heatmaps for {} tiles",
                metas.len()
            )));
        }
        if channels < self.heatmap_count {
            return Err(PipelineError::reassembly(format!(
                "model produced {channels} heatmap channels, {} required",
                self.heatmap_count
            )));
        }

        let mut predictions = Vec::new();
        let mut previous_image: Option<usize> = None;

        let groups = metas
            .iter()
            .enumerate()
            .chunk_by(|(_, meta)| meta.source_image_index);

        for (image_index, tiles_of_image) in &groups {
            // chunk_by only splits on key changes, so a revisited image shows
            // up as a key that does not increase.
            if let Some(prev) = previous_image.filter(|&prev| image_index <= prev) {
                return Err(PipelineError::reassembly(format!(
                    "tiles of image {image_index} arrived after image {prev}"
                )));
            }
            previous_image = Some(image_index);

            let original_size = original_sizes.get(image_index).copied().ok_or_else(|| {
                PipelineError::reassembly(format!("no original size for image {image_index}"))
            })?;

            let mut strips: Vec<Vec<ArrayView2<'_, f32>>> = vec![Vec::new(); self.heatmap_count];
            let mut expected_order = 0usize;
            let mut kept_rows = 0usize;

            for (tile_index, meta) in tiles_of_image {
                if meta.order_within_image != expected_order {
                    return Err(PipelineError::reassembly(format!(
                        "image {image_index}: expected tile {expected_order}, got tile {}",
                        meta.order_within_image
                    )));
                }
                expected_order += 1;

                let valid = meta.valid_height as usize;
                if valid == 0 || valid > rows {
                    return Err(PipelineError::reassembly(format!(
                        "image {image_index} tile {}: valid height {valid} outside 1..={rows}",
                        meta.order_within_image
                    )));
                }
                kept_rows += valid;

                let tile = heatmaps.index_axis(Axis(0), tile_index);
                for (channel, strip) in strips.iter_mut().enumerate() {
                    let plane = tile.index_axis_move(Axis(0), channel);
                    strip.push(plane.slice_move(s![..valid, ..]));
                }
            }

            if kept_rows != original_size.1 as usize {
                return Err(PipelineError::reassembly(format!(
                    "image {image_index}: reassembled {kept_rows} rows, expected {}",
                    original_size.1
                )));
            }

            let channels = strips
                .iter()
                .map(|views| ndarray::concatenate(Axis(0), views))
                .collect::<Result<Vec<_>, _>>()?;

            debug!(
                image_index,
                tiles = expected_order,
                rows = kept_rows,
                "reassembled image heatmaps"
            );

            predictions.push(ReassembledPrediction {
                image_index,
                heatmaps: HeatmapSet::new(channels)?,
                original_size,
            });
        }

        Ok(predictions)
    }
}
