//! Splitting images into model-window tiles.
//!
//! An image is cut into horizontal strips of the window height, top to
//! bottom, keeping its full width. The last strip is padded to the window
//! height when the image does not divide evenly, and every strip is resized
//! horizontally to the window width so all tiles share one tensor shape.
//! Rows therefore map one-to-one between a tile and its heatmap.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::core::errors::{PipelineError, PipelineResult};

/// Position of a tile within its source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileMeta {
    /// Input index of the image this tile was cut from.
    pub source_image_index: usize,
    /// Number of rows holding image content; the rest is padding.
    pub valid_height: u32,
    /// Zero-based position of the tile, counted from the top of the image.
    pub order_within_image: usize,
}

/// A window-sized piece of an image.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Pixels, exactly `window_width` x `window_height`.
    pub image: RgbImage,
    /// Where the tile came from.
    pub meta: TileMeta,
}

/// Number of tiles an image of `height` rows splits into.
///
/// This is `ceil(height / window_height)`; callers validate that both are
/// positive before planning.
#[inline]
pub fn count_tiles(height: u32, window_height: u32) -> usize {
    height.div_ceil(window_height) as usize
}

/// Cuts images into fixed-size tiles.
#[derive(Debug, Clone, Copy)]
pub struct Tiler {
    window_width: u32,
    window_height: u32,
    pad_value: u8,
}

impl Tiler {
    /// Creates a tiler for a `window_width` x `window_height` model window.
    pub fn new(window_width: u32, window_height: u32) -> PipelineResult<Self> {
        if window_width == 0 || window_height == 0 {
            return Err(PipelineError::validation_error(
                "Tiler",
                "window",
                "positive width and height",
                &format!("{window_width}x{window_height}"),
            ));
        }
        Ok(Self {
            window_width,
            window_height,
            pad_value: 0,
        })
    }

    /// Sets the gray level used for padding rows.
    pub fn with_pad_value(mut self, pad_value: u8) -> Self {
        self.pad_value = pad_value;
        self
    }

    /// Window width in pixels.
    pub fn window_width(&self) -> u32 {
        self.window_width
    }

    /// Window height in pixels.
    pub fn window_height(&self) -> u32 {
        self.window_height
    }

    /// Number of tiles an image `height` rows tall will produce.
    pub fn count_tiles(&self, height: u32) -> usize {
        count_tiles(height, self.window_height)
    }

    /// Splits `image` into ordered tiles tagged with `source_image_index`.
    pub fn tile(&self, image: &RgbImage, source_image_index: usize) -> PipelineResult<Vec<Tile>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::invalid_input(format!(
                "image {source_image_index} has zero size ({width}x{height})"
            )));
        }

        let tile_count = count_tiles(height, self.window_height);
        let mut tiles = Vec::with_capacity(tile_count);

        for order in 0..tile_count {
            let top = order as u32 * self.window_height;
            let valid_height = self.window_height.min(height - top);

            let strip = imageops::crop_imm(image, 0, top, width, valid_height).to_image();
            let padded = if valid_height < self.window_height {
                let mut canvas =
                    RgbImage::from_pixel(width, self.window_height, Rgb([self.pad_value; 3]));
                imageops::replace(&mut canvas, &strip, 0, 0);
                canvas
            } else {
                strip
            };

            let image = if width != self.window_width {
                imageops::resize(
                    &padded,
                    self.window_width,
                    self.window_height,
                    FilterType::Triangle,
                )
            } else {
                padded
            };

            tiles.push(Tile {
                image,
                meta: TileMeta {
                    source_image_index,
                    valid_height,
                    order_within_image: order,
                },
            });
        }

        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| Rgb([(y % 251) as u8 + 1, 0, 0]))
    }

    #[test]
    fn test_count_tiles_is_ceiling() {
        assert_eq!(count_tiles(1, 10), 1);
        assert_eq!(count_tiles(10, 10), 1);
        assert_eq!(count_tiles(11, 10), 2);
        assert_eq!(count_tiles(29, 10), 3);
        assert_eq!(count_tiles(30, 10), 3);
    }

    #[test]
    fn test_rejects_empty_window() {
        assert!(Tiler::new(0, 10).is_err());
        assert!(Tiler::new(10, 0).is_err());
    }

    #[test]
    fn test_rejects_zero_sized_image() {
        let tiler = Tiler::new(8, 8).unwrap();
        let err = tiler.tile(&RgbImage::new(0, 5), 3).unwrap_err();
        assert!(err.to_string().contains("image 3"));
    }

    #[test]
    fn test_valid_heights_sum_to_image_height() {
        let tiler = Tiler::new(8, 10).unwrap();
        let image = striped(8, 27);
        let tiles = tiler.tile(&image, 0).unwrap();

        assert_eq!(tiles.len(), 3);
        let heights: Vec<u32> = tiles.iter().map(|t| t.meta.valid_height).collect();
        assert_eq!(heights, vec![10, 10, 7]);
        assert_eq!(heights.iter().sum::<u32>(), 27);
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.meta.order_within_image, i);
            assert_eq!(tile.image.dimensions(), (8, 10));
        }
    }

    #[test]
    fn test_one_row_short_boundary() {
        let tiler = Tiler::new(4, 10).unwrap();
        let tiles = tiler.tile(&striped(4, 19), 0).unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1].meta.valid_height, 9);
    }

    #[test]
    fn test_last_tile_is_zero_padded() {
        let tiler = Tiler::new(4, 10).unwrap();
        let tiles = tiler.tile(&striped(4, 13), 0).unwrap();
        let last = &tiles[1].image;
        // Row 12 of the source lands on row 2 of the second tile.
        assert_eq!(last.get_pixel(0, 2)[0], 13);
        for y in 3..10 {
            assert_eq!(*last.get_pixel(0, y), Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn test_custom_pad_value() {
        let tiler = Tiler::new(4, 10).unwrap().with_pad_value(255);
        let tiles = tiler.tile(&striped(4, 5), 0).unwrap();
        assert_eq!(*tiles[0].image.get_pixel(1, 9), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_wide_image_resized_to_window_width() {
        let tiler = Tiler::new(16, 10).unwrap();
        let tiles = tiler.tile(&striped(64, 15), 5).unwrap();
        assert_eq!(tiles.len(), 2);
        assert!(tiles.iter().all(|t| t.image.dimensions() == (16, 10)));
        assert!(tiles.iter().all(|t| t.meta.source_image_index == 5));
    }
}
