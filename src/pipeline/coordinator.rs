//! Producer/consumer coordination of inference and geometry extraction.
//!
//! The producer thread pulls reassembled batches (running the model as a side
//! effect) and pushes them onto a bounded queue. The consumer thread pops
//! them and runs the geometry extractor on every image, either in place or
//! across a rayon pool built once for the run. The consumer is the only
//! writer of the result list, and results are appended a whole batch at a
//! time, so output order always equals input order.

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, info_span, warn};

use crate::core::config::ParallelPolicy;
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};
use crate::pipeline::result::DetectionResult;
use crate::pipeline::stats::{PipelineStats, PostprocessStrategy};
use crate::processors::{GeometryExtractor, ReassembledPrediction};

/// Reassembled predictions of one batch, ready for geometry extraction.
#[derive(Debug, Clone)]
pub struct PredictionBatch {
    pub batch_index: usize,
    /// One entry per image, in input order.
    pub predictions: Vec<ReassembledPrediction>,
    /// Tiles the model saw for this batch.
    pub tile_count: usize,
    /// Whether a single image exceeded the tile budget.
    pub oversized: bool,
    /// Time spent producing the batch.
    pub inference_time: Duration,
}

enum QueueMessage {
    Batch(PredictionBatch),
    EndOfStream,
}

/// Runs inference and geometry extraction concurrently.
pub struct PipelineCoordinator<'a> {
    extractor: &'a dyn GeometryExtractor,
    policy: ParallelPolicy,
    queue_capacity: usize,
}

impl std::fmt::Debug for PipelineCoordinator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("policy", &self.policy)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl<'a> PipelineCoordinator<'a> {
    /// Creates a coordinator. `queue_capacity` bounds the number of batches
    /// waiting for the consumer and must be positive.
    pub fn new(
        extractor: &'a dyn GeometryExtractor,
        policy: ParallelPolicy,
        queue_capacity: usize,
    ) -> PipelineResult<Self> {
        if queue_capacity == 0 {
            return Err(PipelineError::config_error_with_context(
                "queue_capacity",
                "0",
                "queue capacity must be greater than 0",
            ));
        }
        Ok(Self {
            extractor,
            policy,
            queue_capacity,
        })
    }

    /// The post-processing strategy used for a run over `image_count` images.
    pub fn strategy_for(&self, image_count: usize) -> PostprocessStrategy {
        match self.policy.parallel_workers_for(image_count) {
            Some(workers) => PostprocessStrategy::Parallel { workers },
            None => PostprocessStrategy::Sequential,
        }
    }

    /// Drains `batches` and returns one detection per image, in input order.
    ///
    /// The first error from either side stops the run. When both sides fail,
    /// the producer's error wins unless it only reports that the consumer had
    /// already hung up.
    pub fn run<I>(
        &self,
        batches: I,
        image_count: usize,
    ) -> PipelineResult<(Vec<DetectionResult>, PipelineStats)>
    where
        I: IntoIterator<Item = PipelineResult<PredictionBatch>>,
        I::IntoIter: Send,
    {
        let strategy = self.strategy_for(image_count);
        let (tx, rx) = sync_channel::<QueueMessage>(self.queue_capacity);
        let batches = batches.into_iter();

        let (producer_result, consumer_result) = thread::scope(|scope| {
            let producer = scope.spawn(move || produce(batches, tx));
            let consumer = scope.spawn(move || self.consume(rx, strategy, image_count));
            (
                producer
                    .join()
                    .unwrap_or_else(|payload| Err(PipelineError::worker_panic("producer", payload))),
                consumer
                    .join()
                    .unwrap_or_else(|payload| Err(PipelineError::worker_panic("consumer", payload))),
            )
        });

        match (producer_result, consumer_result) {
            (Err(PipelineError::QueueClosed { .. }), Err(consumer_error)) => Err(consumer_error),
            (Err(producer_error), _) => Err(producer_error),
            (Ok(_), Err(consumer_error)) => Err(consumer_error),
            (Ok(mut stats), Ok((results, consumer_stats))) => {
                stats.merge(&consumer_stats);
                info!(
                    images = stats.images,
                    batches = stats.batches,
                    tiles = stats.tiles,
                    strategy = %stats.strategy,
                    "detection run finished"
                );
                Ok((results, stats))
            }
        }
    }

    fn consume(
        &self,
        rx: Receiver<QueueMessage>,
        strategy: PostprocessStrategy,
        image_count: usize,
    ) -> PipelineResult<(Vec<DetectionResult>, PipelineStats)> {
        let _span = info_span!("consumer", %strategy).entered();

        let pool = match strategy {
            PostprocessStrategy::Parallel { workers } => Some(self.build_pool(workers)?),
            PostprocessStrategy::Sequential => None,
        };

        let mut stats = PipelineStats {
            strategy,
            ..PipelineStats::default()
        };
        let mut results = Vec::with_capacity(image_count);

        loop {
            let batch = match rx.recv() {
                Ok(QueueMessage::Batch(batch)) => batch,
                Ok(QueueMessage::EndOfStream) => break,
                Err(_) => {
                    return Err(PipelineError::queue_closed(
                        "producer stopped before end of stream",
                    ));
                }
            };

            let started = Instant::now();
            let batch_index = batch.batch_index;
            let detections = self.extract_batch(batch, pool.as_ref())?;
            debug!(
                batch_index,
                images = detections.len(),
                "extracted geometry"
            );
            results.extend(detections);
            stats.postprocess_time += started.elapsed();
        }

        if results.len() != image_count {
            return Err(PipelineError::batch_processing(
                "result count does not match input",
                SimpleError::new(format!(
                    "expected {image_count} results, produced {}",
                    results.len()
                )),
            ));
        }
        stats.images = results.len();
        Ok((results, stats))
    }

    fn build_pool(&self, workers: usize) -> PipelineResult<ThreadPool> {
        let prefix = self.policy.thread_name_prefix.clone();
        ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| {
                PipelineError::batch_processing("failed to build post-processing pool", e)
            })
    }

    fn extract_batch(
        &self,
        batch: PredictionBatch,
        pool: Option<&ThreadPool>,
    ) -> PipelineResult<Vec<DetectionResult>> {
        let batch_index = batch.batch_index;
        match pool {
            Some(pool) => pool.install(|| {
                batch
                    .predictions
                    .into_par_iter()
                    .map(|prediction| self.extract_one(batch_index, prediction))
                    .collect()
            }),
            None => batch
                .predictions
                .into_iter()
                .map(|prediction| self.extract_one(batch_index, prediction))
                .collect(),
        }
    }

    fn extract_one(
        &self,
        batch_index: usize,
        prediction: ReassembledPrediction,
    ) -> PipelineResult<DetectionResult> {
        let image_index = prediction.image_index;
        let (Some(region), Some(affinity)) =
            (prediction.heatmaps.region(), prediction.heatmaps.affinity())
        else {
            return Err(PipelineError::batch_item_error(
                "geometry extraction",
                batch_index,
                image_index,
                SimpleError::new("missing region or affinity heatmap"),
            ));
        };

        self.extractor
            .extract(region, affinity, prediction.original_size)
            .map_err(|e| {
                PipelineError::batch_item_error("geometry extraction", batch_index, image_index, e)
            })
    }
}

fn produce<I>(batches: I, tx: SyncSender<QueueMessage>) -> PipelineResult<PipelineStats>
where
    I: Iterator<Item = PipelineResult<PredictionBatch>>,
{
    let _span = info_span!("producer").entered();
    let mut stats = PipelineStats::default();

    for batch in batches {
        let batch = batch?;
        stats.batches += 1;
        stats.tiles += batch.tile_count;
        stats.inference_time += batch.inference_time;
        if batch.oversized {
            stats.oversized_batches += 1;
        }

        if tx.send(QueueMessage::Batch(batch)).is_err() {
            warn!("consumer stopped early, abandoning remaining batches");
            return Err(PipelineError::queue_closed(
                "consumer stopped before the last batch",
            ));
        }
    }

    tx.send(QueueMessage::EndOfStream)
        .map_err(|_| PipelineError::queue_closed("consumer stopped before end of stream"))?;
    Ok(stats)
}
