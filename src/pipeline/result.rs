//! Detection output types.

use std::fmt;

use image::GrayImage;
use serde::Serialize;

use crate::processors::BoundingBox;

/// A detected text region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBox {
    /// Region outline in original image coordinates.
    pub polygon: BoundingBox,
    /// Axis-aligned extent as `[x_min, y_min, x_max, y_max]`.
    pub bbox: [f32; 4],
    /// Mean region score inside the detection.
    pub confidence: f32,
}

/// A vertical separator, `[x, y1, x, y2]` in original image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VerticalLine {
    pub bbox: [f32; 4],
}

impl VerticalLine {
    /// Length of the segment in pixels.
    pub fn length(&self) -> f32 {
        (self.bbox[3] - self.bbox[1]).abs()
    }
}

/// Detections for one input image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Text regions, in the extractor's order.
    pub bboxes: Vec<TextBox>,
    pub vertical_lines: Vec<VerticalLine>,
    /// Region heatmap at model resolution, scaled to `0..=255`.
    pub heatmap: GrayImage,
    /// Affinity heatmap at model resolution, scaled to `0..=255`.
    pub affinity_map: GrayImage,
    /// `[0, 0, width, height]` of the original image.
    pub image_bbox: [f32; 4],
}

impl DetectionResult {
    /// Whether nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty() && self.vertical_lines.is_empty()
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image {}x{}",
            self.image_bbox[2] as u32, self.image_bbox[3] as u32
        )?;
        writeln!(f, "  Total regions: {}", self.bboxes.len())?;
        for (i, text) in self.bboxes.iter().enumerate() {
            let [x1, y1, x2, y2] = text.bbox;
            writeln!(
                f,
                "    Region {i}: [{x1:.0}, {y1:.0}, {x2:.0}, {y2:.0}] (score: {:.3})",
                text.confidence
            )?;
        }
        writeln!(f, "  Vertical lines: {}", self.vertical_lines.len())?;
        for (i, line) in self.vertical_lines.iter().enumerate() {
            let [x, y1, _, y2] = line.bbox;
            writeln!(f, "    Line {i}: x={x:.0}, y={y1:.0}..{y2:.0}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_regions() {
        let result = DetectionResult {
            bboxes: vec![TextBox {
                polygon: BoundingBox::from_coords(1.0, 2.0, 30.0, 12.0),
                bbox: [1.0, 2.0, 30.0, 12.0],
                confidence: 0.875,
            }],
            vertical_lines: vec![VerticalLine {
                bbox: [50.0, 0.0, 50.0, 80.0],
            }],
            heatmap: GrayImage::new(4, 4),
            affinity_map: GrayImage::new(4, 4),
            image_bbox: [0.0, 0.0, 100.0, 80.0],
        };

        let text = result.to_string();
        assert!(text.starts_with("Image 100x80"));
        assert!(text.contains("Region 0: [1, 2, 30, 12] (score: 0.875)"));
        assert!(text.contains("Line 0: x=50, y=0..80"));
        assert!(!result.is_empty());
        assert_eq!(result.vertical_lines[0].length(), 80.0);
    }
}
