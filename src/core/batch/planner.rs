//! Tile-budget batch planning.
//!
//! Images are grouped greedily in input order: each image's tile count is added
//! to a running total, and the current batch is closed as soon as the next
//! image would push it over the budget. An image whose tiles alone exceed the
//! budget still forms a batch of its own; the budget is a soft cap and never
//! truncates an image.

use std::iter::FusedIterator;
use std::ops::Range;

use crate::core::errors::{PipelineError, PipelineResult};

/// A contiguous run of input images processed by one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBatch {
    /// Position of this batch in the plan.
    pub batch_index: usize,
    /// Input indices of the images in this batch.
    pub image_indices: Range<usize>,
    /// Total number of tiles the batch will produce.
    pub tile_count: usize,
}

impl ImageBatch {
    /// Number of images in the batch.
    pub fn len(&self) -> usize {
        self.image_indices.len()
    }

    /// Whether the batch holds no images.
    pub fn is_empty(&self) -> bool {
        self.image_indices.is_empty()
    }

    /// Whether the batch exceeds `budget` (only possible for a single image).
    pub fn is_oversized(&self, budget: usize) -> bool {
        self.tile_count > budget
    }
}

/// Plans batches under a tile budget.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    max_tiles_per_batch: usize,
}

impl BatchPlanner {
    /// Creates a planner. The budget must be positive.
    pub fn new(max_tiles_per_batch: usize) -> PipelineResult<Self> {
        if max_tiles_per_batch == 0 {
            return Err(PipelineError::config_error_with_context(
                "max_tiles_per_batch",
                "0",
                "tile budget must be greater than 0",
            ));
        }
        Ok(Self {
            max_tiles_per_batch,
        })
    }

    /// The configured tile budget.
    pub fn max_tiles_per_batch(&self) -> usize {
        self.max_tiles_per_batch
    }

    /// Starts a pull-based plan over per-image tile counts.
    pub fn plan(&self, tiles_per_image: Vec<usize>) -> BatchPlan {
        BatchPlan {
            tiles_per_image,
            budget: self.max_tiles_per_batch,
            cursor: 0,
            next_batch_index: 0,
        }
    }

    /// Plans every batch eagerly.
    pub fn plan_all(&self, tiles_per_image: Vec<usize>) -> Vec<ImageBatch> {
        self.plan(tiles_per_image).collect()
    }
}

/// Iterator over planned batches.
///
/// Once it returns `None` it stays exhausted; planning again requires a new
/// call to [`BatchPlanner::plan`].
#[derive(Debug, Clone)]
pub struct BatchPlan {
    tiles_per_image: Vec<usize>,
    budget: usize,
    cursor: usize,
    next_batch_index: usize,
}

impl BatchPlan {
    /// Whether every image has been assigned to a batch.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.tiles_per_image.len()
    }

    /// Number of images not yet assigned to a batch.
    pub fn remaining_images(&self) -> usize {
        self.tiles_per_image.len().saturating_sub(self.cursor)
    }
}

impl Iterator for BatchPlan {
    type Item = ImageBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }

        let start = self.cursor;
        let mut tile_count = 0usize;
        while let Some(&tiles) = self.tiles_per_image.get(self.cursor) {
            if tile_count + tiles > self.budget && self.cursor > start {
                break;
            }
            tile_count += tiles;
            self.cursor += 1;
        }

        let batch = ImageBatch {
            batch_index: self.next_batch_index,
            image_indices: start..self.cursor,
            tile_count,
        };
        self.next_batch_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_images();
        ((remaining > 0) as usize, Some(remaining))
    }
}

impl FusedIterator for BatchPlan {}
