//! Run statistics.
//!
//! The producer and consumer threads each fill in their own half of
//! [`PipelineStats`]; the halves are merged once both threads have joined.

use std::fmt;
use std::time::Duration;

/// How geometry extraction was scheduled for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostprocessStrategy {
    /// One image after another on the consumer thread.
    #[default]
    Sequential,
    /// Fanned out over a dedicated thread pool.
    Parallel {
        /// Pool size.
        workers: usize,
    },
}

impl fmt::Display for PostprocessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostprocessStrategy::Sequential => write!(f, "sequential"),
            PostprocessStrategy::Parallel { workers } => write!(f, "parallel ({workers} workers)"),
        }
    }
}

/// Statistics for one detection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Images detected.
    pub images: usize,
    /// Model calls.
    pub batches: usize,
    /// Tiles sent to the model.
    pub tiles: usize,
    /// Batches holding a single image over the tile budget.
    pub oversized_batches: usize,
    /// Time spent tiling, running the model and reassembling.
    pub inference_time: Duration,
    /// Time spent extracting geometry.
    pub postprocess_time: Duration,
    pub strategy: PostprocessStrategy,
}

impl PipelineStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another half of the statistics into this one.
    pub fn merge(&mut self, other: &PipelineStats) {
        self.images += other.images;
        self.batches += other.batches;
        self.tiles += other.tiles;
        self.oversized_batches += other.oversized_batches;
        self.inference_time += other.inference_time;
        self.postprocess_time += other.postprocess_time;
        if other.strategy != PostprocessStrategy::Sequential {
            self.strategy = other.strategy;
        }
    }

    /// Average tiles per model call.
    pub fn tiles_per_batch(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.tiles as f64 / self.batches as f64
        }
    }

    /// Images per second over inference and post-processing combined.
    pub fn images_per_second(&self) -> f64 {
        let total = (self.inference_time + self.postprocess_time).as_secs_f64();
        if total == 0.0 {
            0.0
        } else {
            self.images as f64 / total
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Statistics:")?;
        writeln!(f, "  Images: {}", self.images)?;
        writeln!(
            f,
            "  Batches: {} ({} oversized, {:.1} tiles/batch)",
            self.batches,
            self.oversized_batches,
            self.tiles_per_batch()
        )?;
        writeln!(f, "  Tiles: {}", self.tiles)?;
        writeln!(
            f,
            "  Inference time: {:.2} ms",
            self.inference_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Post-processing time: {:.2} ms ({})",
            self.postprocess_time.as_secs_f64() * 1000.0,
            self.strategy
        )?;
        writeln!(
            f,
            "  Processing speed: {:.2} images/sec",
            self.images_per_second()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_halves() {
        let mut producer = PipelineStats {
            batches: 3,
            tiles: 10,
            oversized_batches: 1,
            inference_time: Duration::from_millis(30),
            ..PipelineStats::default()
        };
        let consumer = PipelineStats {
            images: 7,
            postprocess_time: Duration::from_millis(10),
            strategy: PostprocessStrategy::Parallel { workers: 4 },
            ..PipelineStats::default()
        };
        producer.merge(&consumer);

        assert_eq!(producer.images, 7);
        assert_eq!(producer.batches, 3);
        assert_eq!(producer.strategy, PostprocessStrategy::Parallel { workers: 4 });
        assert!((producer.images_per_second() - 175.0).abs() < 1e-6);
        assert!((producer.tiles_per_batch() - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats_rates_are_zero() {
        let stats = PipelineStats::new();
        assert_eq!(stats.tiles_per_batch(), 0.0);
        assert_eq!(stats.images_per_second(), 0.0);
        assert!(stats.to_string().contains("sequential"));
    }
}
