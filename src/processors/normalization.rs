//! Tile normalization.
//!
//! Converts window-sized RGB tiles into one `[tiles, 3, height, width]`
//! float tensor, applying `(pixel * scale - mean) / std` per channel.

use image::RgbImage;
use ndarray::{Array4, Axis};
use rayon::prelude::*;

use crate::core::Tensor4D;
use crate::core::config::NormalizationConfig;
use crate::core::constants::MAX_TENSOR_SIZE;
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};

/// Normalizes tiles for the detection model.
///
/// The per-channel transform is folded into `alpha = scale / std` and
/// `beta = -mean / std`.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a normalizer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the scale or any standard deviation is not positive,
    /// or if the folded coefficients are not finite.
    pub fn new(config: &NormalizationConfig) -> PipelineResult<Self> {
        if config.scale.is_nan() || config.scale <= 0.0 {
            return Err(PipelineError::config_error(
                "Scale must be greater than 0".to_string(),
            ));
        }
        for (i, &s) in config.std.iter().enumerate() {
            if s.is_nan() || s <= 0.0 {
                return Err(PipelineError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let alpha = [
            config.scale / config.std[0],
            config.scale / config.std[1],
            config.scale / config.std[2],
        ];
        let beta = [
            -config.mean[0] / config.std[0],
            -config.mean[1] / config.std[1],
            -config.mean[2] / config.std[2],
        ];

        if alpha.iter().chain(beta.iter()).any(|v| !v.is_finite()) {
            return Err(PipelineError::config_error(
                "Normalization coefficients must be finite",
            ));
        }

        Ok(Self { alpha, beta })
    }

    /// Stacks tiles of identical size into a normalized CHW batch tensor.
    pub fn normalize_batch(&self, tiles: &[&RgbImage]) -> PipelineResult<Tensor4D> {
        let Some(first) = tiles.first() else {
            return Err(PipelineError::invalid_input(
                "cannot normalize an empty tile batch",
            ));
        };
        let (width, height) = first.dimensions();

        if let Some((i, tile)) = tiles
            .iter()
            .enumerate()
            .find(|(_, t)| t.dimensions() != (width, height))
        {
            let (w, h) = tile.dimensions();
            return Err(PipelineError::tensor_operation_error(
                "normalize_batch",
                &[3, height as usize, width as usize],
                &[3, h as usize, w as usize],
                &format!("tile {i} does not match the batch window"),
                SimpleError::new("inconsistent tile size"),
            ));
        }

        let (h, w) = (height as usize, width as usize);
        let total = tiles.len() * 3 * h * w;
        if total > MAX_TENSOR_SIZE {
            return Err(PipelineError::normalization(
                &format!("batch tensor of {total} elements exceeds maximum {MAX_TENSOR_SIZE}"),
                SimpleError::new("batch too large"),
            ));
        }

        let mut batch = Array4::<f32>::zeros((tiles.len(), 3, h, w));
        batch
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(tiles.par_iter())
            .for_each(|(mut chw, tile)| {
                for (x, y, pixel) in tile.enumerate_pixels() {
                    let (x, y) = (x as usize, y as usize);
                    for c in 0..3 {
                        chw[[c, y, x]] = pixel[c] as f32 * self.alpha[c] + self.beta[c];
                    }
                }
            });

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn identity_config() -> NormalizationConfig {
        NormalizationConfig {
            scale: 1.0 / 255.0,
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = identity_config();
        config.std[1] = 0.0;
        assert!(NormalizeImage::new(&config).is_err());

        let mut config = identity_config();
        config.scale = -1.0;
        assert!(NormalizeImage::new(&config).is_err());
    }

    #[test]
    fn test_normalize_batch_layout() {
        let norm = NormalizeImage::new(&identity_config()).unwrap();
        let a = RgbImage::from_pixel(3, 2, Rgb([255, 0, 51]));
        let b = RgbImage::from_pixel(3, 2, Rgb([0, 255, 0]));
        let batch = norm.normalize_batch(&[&a, &b]).unwrap();

        assert_eq!(batch.shape(), &[2, 3, 2, 3]);
        assert!((batch[[0, 0, 1, 2]] - 1.0).abs() < 1e-6);
        assert!((batch[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
        assert!((batch[[1, 1, 0, 1]] - 1.0).abs() < 1e-6);
        assert!(batch[[1, 0, 0, 0]].abs() < 1e-6);
    }

    #[test]
    fn test_default_imagenet_normalization() {
        let norm = NormalizeImage::new(&NormalizationConfig::default()).unwrap();
        let tile = RgbImage::from_pixel(1, 1, Rgb([124, 116, 104]));
        let batch = norm.normalize_batch(&[&tile]).unwrap();
        for c in 0..3 {
            assert!(batch[[0, c, 0, 0]].abs() < 0.01);
        }
    }

    #[test]
    fn test_rejects_mixed_sizes_and_empty() {
        let norm = NormalizeImage::new(&identity_config()).unwrap();
        let a = RgbImage::new(3, 2);
        let b = RgbImage::new(2, 3);
        assert!(norm.normalize_batch(&[&a, &b]).is_err());
        assert!(norm.normalize_batch(&[]).is_err());
    }
}
