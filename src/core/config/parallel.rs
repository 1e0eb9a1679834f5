//! Parallel post-processing policy.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};

/// Upper bound on the default worker count.
const MAX_DEFAULT_CPU_WORKERS: usize = 8;

/// Controls whether and how geometry extraction fans out across worker threads.
///
/// The choice between sequential and parallel extraction is made once per
/// run from this policy and the number of input images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Size of the post-processing worker pool.
    /// Default: `min(8, available cores)`.
    #[serde(default = "ParallelPolicy::default_cpu_workers")]
    pub cpu_workers: usize,

    /// Minimum number of input images before parallel extraction is used.
    /// Default: 3
    #[serde(default = "ParallelPolicy::default_min_parallel_images")]
    pub min_parallel_images: usize,

    /// Whether the host allows spawning a worker pool at all.
    /// Default: true
    #[serde(default = "ParallelPolicy::default_parallel_allowed")]
    pub parallel_postprocess_allowed: bool,

    /// Prefix for worker thread names.
    #[serde(default = "ParallelPolicy::default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size.
    pub fn with_cpu_workers(mut self, workers: usize) -> Self {
        self.cpu_workers = workers;
        self
    }

    /// Set the parallel image threshold.
    pub fn with_min_parallel_images(mut self, threshold: usize) -> Self {
        self.min_parallel_images = threshold;
        self
    }

    /// Allow or forbid the worker pool.
    pub fn with_parallel_postprocess_allowed(mut self, allowed: bool) -> Self {
        self.parallel_postprocess_allowed = allowed;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Returns the worker count to use for `image_count` images, or `None`
    /// when extraction should run sequentially.
    pub fn parallel_workers_for(&self, image_count: usize) -> Option<usize> {
        if !self.parallel_postprocess_allowed || image_count < self.min_parallel_images {
            return None;
        }
        let workers = self.cpu_workers.min(image_count);
        (workers > 1).then_some(workers)
    }

    fn default_cpu_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_DEFAULT_CPU_WORKERS)
    }

    fn default_min_parallel_images() -> usize {
        3
    }

    fn default_parallel_allowed() -> bool {
        true
    }

    fn default_thread_name_prefix() -> String {
        "tiledet-postprocess".to_string()
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            cpu_workers: Self::default_cpu_workers(),
            min_parallel_images: Self::default_min_parallel_images(),
            parallel_postprocess_allowed: Self::default_parallel_allowed(),
            thread_name_prefix: Self::default_thread_name_prefix(),
        }
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_thread_count(self.cpu_workers)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_below_threshold() {
        let policy = ParallelPolicy::new()
            .with_cpu_workers(4)
            .with_min_parallel_images(3);
        assert_eq!(policy.parallel_workers_for(2), None);
        assert_eq!(policy.parallel_workers_for(3), Some(3));
        assert_eq!(policy.parallel_workers_for(10), Some(4));
    }

    #[test]
    fn test_sequential_when_forbidden() {
        let policy = ParallelPolicy::new()
            .with_cpu_workers(4)
            .with_parallel_postprocess_allowed(false);
        assert_eq!(policy.parallel_workers_for(100), None);
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let policy = ParallelPolicy::new()
            .with_cpu_workers(1)
            .with_min_parallel_images(1);
        assert_eq!(policy.parallel_workers_for(10), None);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let policy: ParallelPolicy = serde_json::from_str(r#"{"cpu_workers": 2}"#).unwrap();
        assert_eq!(policy.cpu_workers, 2);
        assert_eq!(policy.min_parallel_images, 3);
        assert!(policy.parallel_postprocess_allowed);
    }
}
