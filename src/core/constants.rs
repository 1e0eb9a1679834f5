//! Constants used throughout the detection pipeline.

/// Default model input window as `(width, height)`.
///
/// This is also the canonical heatmap resolution: model output that comes
/// back at any other size is resampled to it.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (1200, 1200);

/// Default number of heatmap channels (region and affinity).
pub const DEFAULT_HEATMAP_COUNT: usize = 2;

/// Index of the text region heatmap in the model output.
pub const REGION_CHANNEL: usize = 0;

/// Index of the affinity heatmap in the model output.
pub const AFFINITY_CHANNEL: usize = 1;

/// Default tile budget per batch on CPU.
pub const DEFAULT_CPU_BATCH_SIZE: usize = 8;

/// Default tile budget per batch on CUDA devices.
pub const DEFAULT_CUDA_BATCH_SIZE: usize = 36;

/// Default tile budget per batch on Apple MPS devices.
pub const DEFAULT_MPS_BATCH_SIZE: usize = 8;

/// Default number of reassembled batches allowed in flight between
/// inference and post-processing.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// The maximum number of elements allowed in one batch tensor.
pub const MAX_TENSOR_SIZE: usize = 1_000_000_000;
