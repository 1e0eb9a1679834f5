//! Detector settings: defaults, JSON files and environment overrides.
//!
//! Settings are resolved in three layers: built-in defaults, an optional JSON
//! file, then environment variables. Every layer leaves fields it does not
//! mention untouched.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use super::parallel::ParallelPolicy;
use crate::core::constants::{
    DEFAULT_CPU_BATCH_SIZE, DEFAULT_CUDA_BATCH_SIZE, DEFAULT_HEATMAP_COUNT, DEFAULT_INPUT_SIZE,
    DEFAULT_MPS_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY,
};
use crate::core::errors::PipelineResult;
use crate::processors::HeatmapGeometryConfig;

/// Environment variable overriding the tile budget per batch.
pub const ENV_BATCH_SIZE: &str = "DETECTOR_BATCH_SIZE";
/// Environment variable selecting the device the model runs on.
pub const ENV_DEVICE: &str = "DETECTOR_DEVICE";
/// Environment variable setting the post-processing pool size.
pub const ENV_CPU_WORKERS: &str = "DETECTOR_POSTPROCESSING_CPU_WORKERS";
/// Environment variable setting the parallel image threshold.
pub const ENV_MIN_PARALLEL_THRESH: &str = "DETECTOR_MIN_PARALLEL_THRESH";
/// Environment variable forbidding the post-processing pool.
pub const ENV_DISABLE_PARALLEL: &str = "DETECTOR_DISABLE_PARALLEL";
/// Environment variable setting the in-flight batch limit.
pub const ENV_QUEUE_CAPACITY: &str = "DETECTOR_QUEUE_CAPACITY";

/// Device the model executes on. Only used to pick a default batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Host CPU.
    #[default]
    Cpu,
    /// NVIDIA GPU.
    Cuda,
    /// Apple Metal.
    Mps,
}

impl DeviceKind {
    /// Default number of tiles per batch for this device.
    pub fn default_batch_size(self) -> usize {
        match self {
            DeviceKind::Cpu => DEFAULT_CPU_BATCH_SIZE,
            DeviceKind::Cuda => DEFAULT_CUDA_BATCH_SIZE,
            DeviceKind::Mps => DEFAULT_MPS_BATCH_SIZE,
        }
    }
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" | "gpu" => Ok(DeviceKind::Cuda),
            "mps" => Ok(DeviceKind::Mps),
            other => Err(ConfigError::InvalidConfig {
                message: format!("unknown device '{other}', expected cpu, cuda or mps"),
            }),
        }
    }
}

/// Per-channel tile normalization: `(pixel * scale - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default = "NormalizationConfig::default_scale")]
    pub scale: f32,
    #[serde(default = "NormalizationConfig::default_mean")]
    pub mean: [f32; 3],
    #[serde(default = "NormalizationConfig::default_std")]
    pub std: [f32; 3],
}

impl NormalizationConfig {
    fn default_scale() -> f32 {
        1.0 / 255.0
    }

    fn default_mean() -> [f32; 3] {
        [0.485, 0.456, 0.406]
    }

    fn default_std() -> [f32; 3] {
        [0.229, 0.224, 0.225]
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            scale: Self::default_scale(),
            mean: Self::default_mean(),
            std: Self::default_std(),
        }
    }
}

/// Settings for a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Tile budget per batch. `None` picks the device default.
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Device the model runs on.
    #[serde(default)]
    pub device: DeviceKind,

    /// Model input window as `(width, height)`. Heatmaps are resampled to this size.
    #[serde(default = "DetectorSettings::default_input_size")]
    pub input_size: (u32, u32),

    /// Number of heatmap channels the model emits (region + affinity).
    #[serde(default = "DetectorSettings::default_heatmap_count")]
    pub heatmap_count: usize,

    /// Maximum number of reassembled batches waiting for post-processing.
    #[serde(default = "DetectorSettings::default_queue_capacity")]
    pub queue_capacity: usize,

    /// Gray level used to pad the last tile of an image.
    #[serde(default)]
    pub pad_value: u8,

    #[serde(default)]
    pub normalization: NormalizationConfig,

    #[serde(default)]
    pub parallel: ParallelPolicy,

    #[serde(default)]
    pub geometry: HeatmapGeometryConfig,
}

impl DetectorSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tile budget override.
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the device.
    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = device;
        self
    }

    /// Set the model input window `(width, height)`.
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = (width, height);
        self
    }

    /// Set the number of heatmap channels.
    pub fn with_heatmap_count(mut self, count: usize) -> Self {
        self.heatmap_count = count;
        self
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the padding gray level.
    pub fn with_pad_value(mut self, pad_value: u8) -> Self {
        self.pad_value = pad_value;
        self
    }

    /// Set the normalization parameters.
    pub fn with_normalization(mut self, normalization: NormalizationConfig) -> Self {
        self.normalization = normalization;
        self
    }

    /// Set the parallel policy.
    pub fn with_parallel(mut self, parallel: ParallelPolicy) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the geometry extraction parameters.
    pub fn with_geometry(mut self, geometry: HeatmapGeometryConfig) -> Self {
        self.geometry = geometry;
        self
    }

    /// Effective tile budget: the override when set, otherwise the device default.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size
            .unwrap_or_else(|| self.device.default_batch_size())
    }

    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Default settings with the process environment applied on top.
    pub fn from_env() -> PipelineResult<Self> {
        Self::default().with_env_overrides(std::env::vars())
    }

    /// Applies `DETECTOR_*` overrides from an iterator of key/value pairs.
    ///
    /// Unknown keys are ignored; known keys with unparseable values are errors.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(value) = vars.get(ENV_BATCH_SIZE) {
            self.batch_size = Some(parse_env(ENV_BATCH_SIZE, value)?);
        }
        if let Some(value) = vars.get(ENV_DEVICE) {
            self.device = value.parse().map_err(|e: ConfigError| ConfigError::InvalidEnvValue {
                key: ENV_DEVICE.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = vars.get(ENV_CPU_WORKERS) {
            self.parallel.cpu_workers = parse_env(ENV_CPU_WORKERS, value)?;
        }
        if let Some(value) = vars.get(ENV_MIN_PARALLEL_THRESH) {
            self.parallel.min_parallel_images = parse_env(ENV_MIN_PARALLEL_THRESH, value)?;
        }
        if let Some(value) = vars.get(ENV_DISABLE_PARALLEL) {
            let disabled = parse_flag(ENV_DISABLE_PARALLEL, value)?;
            self.parallel.parallel_postprocess_allowed = !disabled;
        }
        if let Some(value) = vars.get(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = parse_env(ENV_QUEUE_CAPACITY, value)?;
        }

        self.validate()?;
        Ok(self)
    }

    fn default_input_size() -> (u32, u32) {
        DEFAULT_INPUT_SIZE
    }

    fn default_heatmap_count() -> usize {
        DEFAULT_HEATMAP_COUNT
    }

    fn default_queue_capacity() -> usize {
        DEFAULT_QUEUE_CAPACITY
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            batch_size: None,
            device: DeviceKind::default(),
            input_size: Self::default_input_size(),
            heatmap_count: Self::default_heatmap_count(),
            queue_capacity: Self::default_queue_capacity(),
            pad_value: 0,
            normalization: NormalizationConfig::default(),
            parallel: ParallelPolicy::default(),
            geometry: HeatmapGeometryConfig::default(),
        }
    }
}

impl ConfigValidator for DetectorSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(batch_size) = self.batch_size {
            self.validate_batch_size(batch_size)?;
        }
        self.validate_image_dimensions(self.input_size.0, self.input_size.1)?;
        if self.heatmap_count < 2 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "heatmap_count must be at least 2 (region and affinity), got {}",
                    self.heatmap_count
                ),
            });
        }
        self.validate_positive_usize(self.queue_capacity, "queue_capacity")?;
        self.validate_positive_f32(self.normalization.scale, "normalization.scale")?;
        for (i, &s) in self.normalization.std.iter().enumerate() {
            self.validate_positive_f32(s, &format!("normalization.std[{i}]"))?;
        }
        self.parallel.validate()?;
        self.geometry.validate()?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnvValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean flag".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_default_batch_sizes() {
        let settings = DetectorSettings::new();
        assert_eq!(settings.effective_batch_size(), 8);
        assert_eq!(
            settings.clone().with_device(DeviceKind::Cuda).effective_batch_size(),
            36
        );
        assert_eq!(
            settings.clone().with_device(DeviceKind::Mps).effective_batch_size(),
            8
        );
        assert_eq!(
            settings
                .with_device(DeviceKind::Cuda)
                .with_batch_size(Some(5))
                .effective_batch_size(),
            5
        );
    }

    #[test]
    fn test_env_overrides() {
        let settings = DetectorSettings::new()
            .with_env_overrides([
                (ENV_BATCH_SIZE, "12"),
                (ENV_DEVICE, "CUDA"),
                (ENV_CPU_WORKERS, "3"),
                (ENV_MIN_PARALLEL_THRESH, "5"),
                (ENV_DISABLE_PARALLEL, "true"),
                (ENV_QUEUE_CAPACITY, "2"),
                ("UNRELATED", "x"),
            ])
            .unwrap();
        assert_eq!(settings.batch_size, Some(12));
        assert_eq!(settings.device, DeviceKind::Cuda);
        assert_eq!(settings.parallel.cpu_workers, 3);
        assert_eq!(settings.parallel.min_parallel_images, 5);
        assert!(!settings.parallel.parallel_postprocess_allowed);
        assert_eq!(settings.queue_capacity, 2);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let err = DetectorSettings::new()
            .with_env_overrides([(ENV_BATCH_SIZE, "many")])
            .unwrap_err();
        assert!(err.to_string().contains(ENV_BATCH_SIZE));

        assert!(
            DetectorSettings::new()
                .with_env_overrides([(ENV_DEVICE, "tpu")])
                .is_err()
        );
        assert!(
            DetectorSettings::new()
                .with_env_overrides([(ENV_BATCH_SIZE, "0")])
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DetectorSettings::new().validate().is_ok());
        assert!(DetectorSettings::new().with_input_size(0, 10).validate().is_err());
        assert!(DetectorSettings::new().with_heatmap_count(1).validate().is_err());
        assert!(DetectorSettings::new().with_queue_capacity(0).validate().is_err());
    }

    #[test]
    fn test_json_partial_document() {
        let settings: DetectorSettings =
            serde_json::from_str(r#"{"device": "mps", "input_size": [640, 320]}"#).unwrap();
        assert_eq!(settings.device, DeviceKind::Mps);
        assert_eq!(settings.input_size, (640, 320));
        assert_eq!(settings.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(settings.heatmap_count, DEFAULT_HEATMAP_COUNT);
    }
}
