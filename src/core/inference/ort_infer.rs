//! ONNX Runtime backed detection model with a pool of sessions.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayD, IxDyn};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::{HeatmapModel, ModelOutput};
use crate::core::Tensor4D;
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};

/// A detection model loaded from an `.onnx` file.
///
/// Sessions are locked round-robin, so `pool_size` calls can run at once.
pub struct OrtHeatmapModel {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtHeatmapModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtHeatmapModel")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl OrtHeatmapModel {
    /// Loads `pool_size` sessions (at least one) from `model_path`.
    ///
    /// The first model input and output are used unless `input_name` is given.
    pub fn new(
        model_path: impl AsRef<Path>,
        input_name: Option<&str>,
        pool_size: usize,
    ) -> PipelineResult<Self> {
        let path = model_path.as_ref();
        let mut sessions = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let session = Session::builder()?
                .with_log_level(LogLevel::Error)?
                .commit_from_file(path)
                .map_err(|e| {
                    PipelineError::inference_error(
                        &path.display().to_string(),
                        "failed to create ONNX session",
                        e,
                    )
                })?;
            sessions.push(session);
        }

        let first = &sessions[0];
        let input_name = match input_name {
            Some(name) => name.to_string(),
            None => first
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "x".to_string()),
        };
        let output_name = first
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                PipelineError::inference_error(
                    &path.display().to_string(),
                    "model declares no outputs",
                    SimpleError::new("no outputs"),
                )
            })?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }
}

impl HeatmapModel for OrtHeatmapModel {
    fn infer(&self, batch: &Tensor4D) -> PipelineResult<ModelOutput> {
        let input = TensorRef::from_array_view(batch.view()).map_err(|e| {
            PipelineError::inference_error(
                &self.model_name,
                &format!("failed to convert input tensor {:?}", batch.shape()),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            PipelineError::inference_error(
                &self.model_name,
                &format!("session {idx}/{} is poisoned", self.sessions.len()),
                SimpleError::new("session lock acquisition failed"),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            PipelineError::inference_error(
                &self.model_name,
                &format!("forward pass failed for input {:?}", batch.shape()),
                e,
            )
        })?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                PipelineError::inference_error(
                    &self.model_name,
                    &format!("output '{}' is not an f32 tensor", self.output_name),
                    e,
                )
            })?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_error() {
        assert!(OrtHeatmapModel::new("does_not_exist.onnx", None, 2).is_err());
    }
}
