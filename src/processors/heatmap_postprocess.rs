//! Heatmap-to-geometry conversion.
//!
//! [`GeometryExtractor`] is the contract the pipeline consumes: one image's
//! region and affinity heatmaps in, boxes and vertical lines out, scaled to
//! the original image. [`HeatmapGeometryExtractor`] is the default
//! implementation, built on connected components of thresholded heatmaps.

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::errors::{PipelineError, PipelineResult, SimpleError};
use crate::pipeline::result::{DetectionResult, TextBox, VerticalLine};
use crate::processors::geometry::BoundingBox;

/// Converts one image's heatmaps into detections.
///
/// Implementations are called from several worker threads at once and must
/// not rely on shared mutable state.
pub trait GeometryExtractor: Send + Sync {
    /// Extracts detections from a region heatmap and an affinity heatmap of
    /// equal shape, scaling coordinates to `original_size` (`(width, height)`).
    fn extract(
        &self,
        region: &Array2<f32>,
        affinity: &Array2<f32>,
        original_size: (u32, u32),
    ) -> PipelineResult<DetectionResult>;
}

impl<F> GeometryExtractor for F
where
    F: Fn(&Array2<f32>, &Array2<f32>, (u32, u32)) -> PipelineResult<DetectionResult> + Send + Sync,
{
    fn extract(
        &self,
        region: &Array2<f32>,
        affinity: &Array2<f32>,
        original_size: (u32, u32),
    ) -> PipelineResult<DetectionResult> {
        self(region, affinity, original_size)
    }
}

/// Thresholds for [`HeatmapGeometryExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapGeometryConfig {
    /// Minimum peak region score for a component to count as text.
    #[serde(default = "HeatmapGeometryConfig::default_text_threshold")]
    pub text_threshold: f32,
    /// Region score above which a pixel belongs to a text component.
    #[serde(default = "HeatmapGeometryConfig::default_low_text")]
    pub low_text: f32,
    /// Minimum component size in heatmap pixels.
    #[serde(default = "HeatmapGeometryConfig::default_min_area")]
    pub min_area: usize,
    /// Affinity score above which a pixel belongs to a line candidate.
    #[serde(default = "HeatmapGeometryConfig::default_line_threshold")]
    pub line_threshold: f32,
    /// Minimum line height as a fraction of the heatmap height.
    #[serde(default = "HeatmapGeometryConfig::default_min_line_height_ratio")]
    pub min_line_height_ratio: f32,
    /// Minimum height-to-width ratio of a line candidate.
    #[serde(default = "HeatmapGeometryConfig::default_min_line_aspect")]
    pub min_line_aspect: f32,
}

impl HeatmapGeometryConfig {
    pub fn with_text_threshold(mut self, threshold: f32) -> Self {
        self.text_threshold = threshold;
        self
    }

    pub fn with_low_text(mut self, threshold: f32) -> Self {
        self.low_text = threshold;
        self
    }

    pub fn with_min_area(mut self, min_area: usize) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn with_line_threshold(mut self, threshold: f32) -> Self {
        self.line_threshold = threshold;
        self
    }

    fn default_text_threshold() -> f32 {
        0.6
    }

    fn default_low_text() -> f32 {
        0.35
    }

    fn default_min_area() -> usize {
        10
    }

    fn default_line_threshold() -> f32 {
        0.6
    }

    fn default_min_line_height_ratio() -> f32 {
        0.1
    }

    fn default_min_line_aspect() -> f32 {
        3.0
    }
}

impl Default for HeatmapGeometryConfig {
    fn default() -> Self {
        Self {
            text_threshold: Self::default_text_threshold(),
            low_text: Self::default_low_text(),
            min_area: Self::default_min_area(),
            line_threshold: Self::default_line_threshold(),
            min_line_height_ratio: Self::default_min_line_height_ratio(),
            min_line_aspect: Self::default_min_line_aspect(),
        }
    }
}

impl ConfigValidator for HeatmapGeometryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_f32_range(self.text_threshold, 0.0, 1.0, "geometry.text_threshold")?;
        self.validate_f32_range(self.low_text, 0.0, 1.0, "geometry.low_text")?;
        self.validate_f32_range(self.line_threshold, 0.0, 1.0, "geometry.line_threshold")?;
        self.validate_f32_range(
            self.min_line_height_ratio,
            0.0,
            1.0,
            "geometry.min_line_height_ratio",
        )?;
        self.validate_positive_f32(self.min_line_aspect, "geometry.min_line_aspect")?;
        if self.low_text > self.text_threshold {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "geometry.low_text ({}) must not exceed geometry.text_threshold ({})",
                    self.low_text, self.text_threshold
                ),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Running statistics of one labelled component.
#[derive(Debug, Clone, Copy)]
struct Component {
    x_min: u32,
    y_min: u32,
    x_max: u32,
    y_max: u32,
    area: usize,
    score_sum: f32,
    peak: f32,
}

impl Component {
    fn new(x: u32, y: u32, score: f32) -> Self {
        Self {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
            area: 1,
            score_sum: score,
            peak: score,
        }
    }

    fn add(&mut self, x: u32, y: u32, score: f32) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
        self.area += 1;
        self.score_sum += score;
        self.peak = self.peak.max(score);
    }

    fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    fn mean_score(&self) -> f32 {
        self.score_sum / self.area as f32
    }
}

/// Labels 8-connected pixels scoring above `threshold` and summarizes each
/// component, in raster order of each component's first pixel.
fn components_above(map: &Array2<f32>, threshold: f32) -> Vec<Component> {
    let (rows, cols) = map.dim();
    let mask = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([u8::from(map[[y as usize, x as usize]] > threshold)])
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<Component> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let score = map[[y as usize, x as usize]];
        match slots.get(&label) {
            Some(&slot) => components[slot].add(x, y, score),
            None => {
                slots.insert(label, components.len());
                components.push(Component::new(x, y, score));
            }
        }
    }
    components
}

/// Renders a probability map as an 8-bit image, `clamp(v * 255)`.
pub fn heatmap_to_gray(map: &Array2<f32>) -> GrayImage {
    let (rows, cols) = map.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = map[[y as usize, x as usize]] * 255.0;
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// Default geometry extractor based on connected components.
#[derive(Debug, Clone, Default)]
pub struct HeatmapGeometryExtractor {
    config: HeatmapGeometryConfig,
}

impl HeatmapGeometryExtractor {
    pub fn new(config: HeatmapGeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeatmapGeometryConfig {
        &self.config
    }

    fn text_boxes(&self, region: &Array2<f32>, sx: f32, sy: f32, size: (f32, f32)) -> Vec<TextBox> {
        components_above(region, self.config.low_text)
            .into_iter()
            .filter(|c| c.area >= self.config.min_area && c.peak >= self.config.text_threshold)
            .map(|c| {
                let polygon = BoundingBox::from_coords(
                    c.x_min as f32,
                    c.y_min as f32,
                    (c.x_max + 1) as f32,
                    (c.y_max + 1) as f32,
                )
                .scale_and_clamp(sx, sy, size.0, size.1);
                TextBox {
                    bbox: polygon.to_xyxy(),
                    polygon,
                    confidence: c.mean_score(),
                }
            })
            .collect()
    }

    fn vertical_lines(
        &self,
        affinity: &Array2<f32>,
        sx: f32,
        sy: f32,
        size: (f32, f32),
    ) -> Vec<VerticalLine> {
        let min_height = self.config.min_line_height_ratio * affinity.nrows() as f32;
        components_above(affinity, self.config.line_threshold)
            .into_iter()
            .filter(|c| {
                let height = c.height() as f32;
                height >= min_height && height / c.width() as f32 >= self.config.min_line_aspect
            })
            .map(|c| {
                let centre = (c.x_min + c.x_max + 1) as f32 / 2.0;
                let x = (centre * sx).clamp(0.0, size.0);
                let y1 = (c.y_min as f32 * sy).clamp(0.0, size.1);
                let y2 = ((c.y_max + 1) as f32 * sy).clamp(0.0, size.1);
                VerticalLine {
                    bbox: [x, y1, x, y2],
                }
            })
            .collect()
    }
}

impl GeometryExtractor for HeatmapGeometryExtractor {
    fn extract(
        &self,
        region: &Array2<f32>,
        affinity: &Array2<f32>,
        original_size: (u32, u32),
    ) -> PipelineResult<DetectionResult> {
        if region.dim() != affinity.dim() {
            return Err(PipelineError::post_processing(
                "region and affinity heatmaps differ in shape",
                SimpleError::new(format!("{:?} vs {:?}", region.dim(), affinity.dim())),
            ));
        }
        let (rows, cols) = region.dim();
        if rows == 0 || cols == 0 {
            return Err(PipelineError::post_processing(
                "empty heatmap",
                SimpleError::new(format!("{rows}x{cols}")),
            ));
        }

        let (width, height) = original_size;
        let size = (width as f32, height as f32);
        let sx = size.0 / cols as f32;
        let sy = size.1 / rows as f32;

        Ok(DetectionResult {
            bboxes: self.text_boxes(region, sx, sy, size),
            vertical_lines: self.vertical_lines(affinity, sx, sy, size),
            heatmap: heatmap_to_gray(region),
            affinity_map: heatmap_to_gray(affinity),
            image_bbox: [0.0, 0.0, size.0, size.1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(rows: usize, cols: usize) -> Array2<f32> {
        Array2::zeros((rows, cols))
    }

    fn fill(map: &mut Array2<f32>, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>, v: f32) {
        for y in rows {
            for x in cols.clone() {
                map[[y, x]] = v;
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(HeatmapGeometryConfig::default().validate().is_ok());
        let bad = HeatmapGeometryConfig::default().with_low_text(0.9);
        assert!(bad.validate().is_err());
        let bad = HeatmapGeometryConfig::default().with_text_threshold(1.5);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: HeatmapGeometryConfig = serde_json::from_str(r#"{"min_area": 4}"#).unwrap();
        assert_eq!(config.min_area, 4);
        assert_eq!(config.text_threshold, 0.6);
    }

    #[test]
    fn test_boxes_scaled_to_original_size() {
        let mut region = blank(10, 10);
        fill(&mut region, 2..4, 1..6, 0.9);
        let affinity = blank(10, 10);

        let extractor = HeatmapGeometryExtractor::default();
        let result = extractor.extract(&region, &affinity, (20, 10)).unwrap();

        assert_eq!(result.bboxes.len(), 1);
        let text = &result.bboxes[0];
        assert_eq!(text.bbox, [2.0, 2.0, 12.0, 4.0]);
        assert!((text.confidence - 0.9).abs() < 1e-5);
        assert_eq!(result.image_bbox, [0.0, 0.0, 20.0, 10.0]);
        assert!(result.vertical_lines.is_empty());
    }

    #[test]
    fn test_weak_and_small_components_dropped() {
        let mut region = blank(10, 10);
        // Above low_text but never reaches text_threshold.
        fill(&mut region, 0..3, 0..5, 0.4);
        // Strong but only 4 pixels.
        fill(&mut region, 7..9, 7..9, 0.95);
        let extractor = HeatmapGeometryExtractor::default();
        let result = extractor.extract(&region, &blank(10, 10), (10, 10)).unwrap();
        assert!(result.bboxes.is_empty());

        let lenient = HeatmapGeometryExtractor::new(HeatmapGeometryConfig::default().with_min_area(4));
        let result = lenient.extract(&region, &blank(10, 10), (10, 10)).unwrap();
        assert_eq!(result.bboxes.len(), 1);
    }

    #[test]
    fn test_separate_components_in_raster_order() {
        let mut region = blank(12, 12);
        fill(&mut region, 6..9, 0..5, 0.8);
        fill(&mut region, 1..4, 6..11, 0.7);
        let result = HeatmapGeometryExtractor::default()
            .extract(&region, &blank(12, 12), (12, 12))
            .unwrap();
        assert_eq!(result.bboxes.len(), 2);
        assert_eq!(result.bboxes[0].bbox, [6.0, 1.0, 11.0, 4.0]);
        assert_eq!(result.bboxes[1].bbox, [0.0, 6.0, 5.0, 9.0]);
    }

    #[test]
    fn test_vertical_line_from_affinity() {
        let mut affinity = blank(20, 10);
        fill(&mut affinity, 4..20, 4..5, 0.8);
        // Wide blob is not a line.
        fill(&mut affinity, 0..2, 0..10, 0.8);
        let result = HeatmapGeometryExtractor::default()
            .extract(&blank(20, 10), &affinity, (20, 40))
            .unwrap();
        assert!(result.bboxes.is_empty());
        assert_eq!(result.vertical_lines.len(), 1);
        assert_eq!(result.vertical_lines[0].bbox, [9.0, 8.0, 9.0, 40.0]);
    }

    #[test]
    fn test_rejects_mismatched_maps() {
        let extractor = HeatmapGeometryExtractor::default();
        assert!(extractor.extract(&blank(4, 4), &blank(4, 5), (4, 4)).is_err());
        assert!(extractor.extract(&blank(0, 4), &blank(0, 4), (4, 4)).is_err());
    }

    #[test]
    fn test_heatmap_to_gray_clamps() {
        let map = Array2::from_shape_vec((1, 3), vec![-0.5, 0.5, 2.0]).unwrap();
        let gray = heatmap_to_gray(&map);
        assert_eq!(gray.as_raw(), &vec![0, 127, 255]);
    }
}
