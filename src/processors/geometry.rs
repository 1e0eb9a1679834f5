//! Geometric primitives for detections.
//!
//! Boxes are kept as polygons so that callers drawing or exporting them do
//! not care whether a detector produced axis-aligned or rotated shapes.

use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Multiplies each coordinate by its own factor.
    #[inline]
    pub fn scaled(self, sx: f32, sy: f32) -> Self {
        Self::new(self.x * sx, self.y * sy)
    }

    /// Clamps the point into `[0, width] x [0, height]`.
    #[inline]
    pub fn clamped(self, width: f32, height: f32) -> Self {
        Self::new(self.x.clamp(0.0, width), self.y.clamp(0.0, height))
    }
}

/// A bounding box represented by a collection of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The points that define the bounding box.
    pub points: Vec<Point>,
}

impl BoundingBox {
    /// Creates a new bounding box from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a rectangle from its top-left and bottom-right corners.
    ///
    /// Points are ordered clockwise starting at the top-left corner.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let points = vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ];
        Self { points }
    }

    /// Calculates the area of the polygon using the shoelace formula.
    ///
    /// Returns 0.0 if the polygon has fewer than 3 points.
    pub fn area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }

        let twice_area: f32 = (0..n)
            .map(|i| {
                let (a, b) = (self.points[i], self.points[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice_area.abs() / 2.0
    }

    pub fn x_min(&self) -> f32 {
        self.fold_axis(|p| p.x, f32::INFINITY, f32::min)
    }

    pub fn y_min(&self) -> f32 {
        self.fold_axis(|p| p.y, f32::INFINITY, f32::min)
    }

    pub fn x_max(&self) -> f32 {
        self.fold_axis(|p| p.x, f32::NEG_INFINITY, f32::max)
    }

    pub fn y_max(&self) -> f32 {
        self.fold_axis(|p| p.y, f32::NEG_INFINITY, f32::max)
    }

    /// Axis-aligned extent as `[x_min, y_min, x_max, y_max]`.
    pub fn to_xyxy(&self) -> [f32; 4] {
        [self.x_min(), self.y_min(), self.x_max(), self.y_max()]
    }

    /// Scales every point, then clamps it into `[0, width] x [0, height]`.
    pub fn scale_and_clamp(&self, sx: f32, sy: f32, width: f32, height: f32) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|p| p.scaled(sx, sy).clamped(width, height))
                .collect(),
        )
    }

    /// Empty polygons report 0.0 on every axis.
    fn fold_axis(&self, axis: impl Fn(&Point) -> f32, init: f32, f: fn(f32, f32) -> f32) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(axis).fold(init, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_area_and_extent() {
        let bbox = BoundingBox::from_coords(1.0, 2.0, 5.0, 4.0);
        assert_eq!(bbox.area(), 8.0);
        assert_eq!(bbox.to_xyxy(), [1.0, 2.0, 5.0, 4.0]);
    }

    #[test]
    fn test_degenerate_polygons() {
        assert_eq!(BoundingBox::new(vec![]).area(), 0.0);
        assert_eq!(BoundingBox::new(vec![]).x_max(), 0.0);
        let line = BoundingBox::new(vec![Point::new(0.0, 0.0), Point::new(3.0, 3.0)]);
        assert_eq!(line.area(), 0.0);
    }

    #[test]
    fn test_scale_and_clamp() {
        let bbox = BoundingBox::from_coords(-1.0, 2.0, 10.0, 4.0);
        let scaled = bbox.scale_and_clamp(2.0, 0.5, 15.0, 100.0);
        assert_eq!(scaled.to_xyxy(), [0.0, 1.0, 15.0, 2.0]);
    }
}
