//! Runs the model on one batch and brings its output to canonical shape.

use ndarray::{Ix4, s};
use tracing::debug;

use super::HeatmapModel;
use crate::core::Tensor4D;
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};
use crate::processors::resample::resize_bilinear;

/// Wraps a [`HeatmapModel`] with input and output shape checks.
///
/// Output heatmaps are cut down to `heatmap_count` channels and resampled to
/// the window size when the model emits a different resolution.
#[derive(Clone, Copy)]
pub struct InferenceAdapter<'m> {
    model: &'m dyn HeatmapModel,
    window_width: usize,
    window_height: usize,
    heatmap_count: usize,
}

impl std::fmt::Debug for InferenceAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceAdapter")
            .field("model", &self.model.model_name())
            .field("window_width", &self.window_width)
            .field("window_height", &self.window_height)
            .field("heatmap_count", &self.heatmap_count)
            .finish()
    }
}

impl<'m> InferenceAdapter<'m> {
    /// `window` is `(width, height)`.
    pub fn new(model: &'m dyn HeatmapModel, window: (u32, u32), heatmap_count: usize) -> Self {
        Self {
            model,
            window_width: window.0 as usize,
            window_height: window.1 as usize,
            heatmap_count,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Runs one batch, returning `[tiles, heatmap_count, window_h, window_w]`.
    pub fn run(&self, batch: &Tensor4D) -> PipelineResult<Tensor4D> {
        let (tiles, _, height, width) = batch.dim();
        if (height, width) != (self.window_height, self.window_width) {
            return Err(PipelineError::tensor_operation_error(
                "model_input",
                &[tiles, 3, self.window_height, self.window_width],
                batch.shape(),
                "tile batch does not match the model window",
                SimpleError::new("input shape mismatch"),
            ));
        }

        let raw = self.model.infer(batch)?;
        let raw_shape = raw.shape().to_vec();
        let output = raw.into_dimensionality::<Ix4>().map_err(|e| {
            PipelineError::tensor_operation_error(
                "model_output",
                &[tiles, self.heatmap_count, self.window_height, self.window_width],
                &raw_shape,
                &format!("model '{}' must return a 4D tensor", self.model_name()),
                e,
            )
        })?;

        let (out_tiles, channels, out_h, out_w) = output.dim();
        if out_tiles != tiles || channels < self.heatmap_count {
            return Err(PipelineError::tensor_operation_error(
                "model_output",
                &[tiles, self.heatmap_count, out_h, out_w],
                &raw_shape,
                &format!(
                    "model '{}' returned {out_tiles} tiles with {channels} channels",
                    self.model_name()
                ),
                SimpleError::new("output shape mismatch"),
            ));
        }

        let output = if channels > self.heatmap_count {
            output.slice_move(s![.., ..self.heatmap_count, .., ..])
        } else {
            output
        };

        if (out_h, out_w) != (self.window_height, self.window_width) {
            debug!(
                model = self.model_name(),
                from = ?(out_h, out_w),
                to = ?(self.window_height, self.window_width),
                "resampling heatmaps"
            );
        }
        resize_bilinear(output, self.window_height, self.window_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::ModelOutput;
    use ndarray::{Array4, ArrayD, Axis, IxDyn};

    fn batch(tiles: usize, h: usize, w: usize) -> Tensor4D {
        Array4::from_shape_fn((tiles, 3, h, w), |(t, c, y, _)| (t * 100 + c * 10 + y) as f32)
    }

    #[test]
    fn test_passthrough_at_window_size() {
        let model = |x: &Tensor4D| -> PipelineResult<ModelOutput> {
            Ok(x.slice(s![.., ..2, .., ..]).to_owned().into_dyn())
        };
        let adapter = InferenceAdapter::new(&model, (6, 4), 2);
        let input = batch(3, 4, 6);
        let out = adapter.run(&input).unwrap();
        assert_eq!(out.shape(), &[3, 2, 4, 6]);
        assert_eq!(out.index_axis(Axis(1), 1), input.index_axis(Axis(1), 1));
    }

    #[test]
    fn test_resamples_half_resolution_output() {
        let model = |x: &Tensor4D| -> PipelineResult<ModelOutput> {
            let (n, _, h, w) = x.dim();
            Ok(ArrayD::from_elem(IxDyn(&[n, 2, h / 2, w / 2]), 0.5))
        };
        let adapter = InferenceAdapter::new(&model, (8, 8), 2);
        let out = adapter.run(&batch(2, 8, 8)).unwrap();
        assert_eq!(out.shape(), &[2, 2, 8, 8]);
        assert!(out.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_extra_channels_are_dropped() {
        let model = |x: &Tensor4D| -> PipelineResult<ModelOutput> {
            let (n, _, h, w) = x.dim();
            Ok(ArrayD::zeros(IxDyn(&[n, 5, h, w])))
        };
        let adapter = InferenceAdapter::new(&model, (4, 4), 2);
        assert_eq!(adapter.run(&batch(1, 4, 4)).unwrap().shape(), &[1, 2, 4, 4]);
    }

    #[test]
    fn test_rejects_malformed_output() {
        let wrong_rank = |_: &Tensor4D| -> PipelineResult<ModelOutput> {
            Ok(ArrayD::zeros(IxDyn(&[1, 2, 4])))
        };
        let adapter = InferenceAdapter::new(&wrong_rank, (4, 4), 2);
        assert!(adapter.run(&batch(1, 4, 4)).is_err());

        let wrong_tiles = |_: &Tensor4D| -> PipelineResult<ModelOutput> {
            Ok(ArrayD::zeros(IxDyn(&[2, 2, 4, 4])))
        };
        let adapter = InferenceAdapter::new(&wrong_tiles, (4, 4), 2);
        assert!(adapter.run(&batch(1, 4, 4)).is_err());

        let too_few_channels = |_: &Tensor4D| -> PipelineResult<ModelOutput> {
            Ok(ArrayD::zeros(IxDyn(&[1, 1, 4, 4])))
        };
        let adapter = InferenceAdapter::new(&too_few_channels, (4, 4), 2);
        assert!(adapter.run(&batch(1, 4, 4)).is_err());
    }

    #[test]
    fn test_rejects_input_outside_window() {
        let model = |x: &Tensor4D| -> PipelineResult<ModelOutput> { Ok(x.clone().into_dyn()) };
        let adapter = InferenceAdapter::new(&model, (4, 4), 2);
        assert!(adapter.run(&batch(1, 5, 4)).is_err());
    }

    #[test]
    fn test_model_error_passes_through() {
        let model = |_: &Tensor4D| -> PipelineResult<ModelOutput> {
            Err(PipelineError::invalid_input("out of device memory"))
        };
        let adapter = InferenceAdapter::new(&model, (4, 4), 2);
        let err = adapter.run(&batch(1, 4, 4)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
        assert!(err.to_string().contains("out of device memory"));
    }
}
