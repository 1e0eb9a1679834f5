//! Image loading and conversion helpers.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use rayon::prelude::*;

use crate::core::errors::{PipelineError, PipelineResult};

/// Number of paths above which images are decoded in parallel.
const PARALLEL_LOAD_THRESHOLD: usize = 4;

/// Converts any image to 8-bit RGB, borrowing when it already is.
pub fn to_rgb(image: &DynamicImage) -> std::borrow::Cow<'_, RgbImage> {
    match image {
        DynamicImage::ImageRgb8(rgb) => std::borrow::Cow::Borrowed(rgb),
        other => std::borrow::Cow::Owned(other.to_rgb8()),
    }
}

/// Loads an image from a file path.
///
/// # Errors
///
/// Returns `PipelineError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: impl AsRef<Path>) -> PipelineResult<DynamicImage> {
    image::open(path.as_ref()).map_err(PipelineError::ImageLoad)
}

/// Loads several images, keeping the order of `paths`.
///
/// Decoding runs on the rayon global pool once there are enough paths to
/// make it worthwhile. The first failure aborts the whole load.
pub fn load_images<P: AsRef<Path> + Sync>(paths: &[P]) -> PipelineResult<Vec<DynamicImage>> {
    if paths.len() > PARALLEL_LOAD_THRESHOLD {
        paths.par_iter().map(load_image).collect()
    } else {
        paths.iter().map(load_image).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    #[test]
    fn test_to_rgb_borrows_rgb_input() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        assert!(matches!(to_rgb(&rgb), std::borrow::Cow::Borrowed(_)));

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([9])));
        let converted = to_rgb(&gray);
        assert_eq!(*converted.get_pixel(1, 1), Rgb([9, 9, 9]));
    }

    #[test]
    fn test_load_images_round_trip_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (1..=6u32)
            .map(|i| {
                let path = dir.path().join(format!("img_{i}.png"));
                RgbImage::new(i, 3).save(&path).unwrap();
                path
            })
            .collect();

        let images = load_images(&paths).unwrap();
        let widths: Vec<u32> = images.iter().map(|img| img.width()).collect();
        assert_eq!(widths, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_missing_file_is_image_load_error() {
        let err = load_image("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, PipelineError::ImageLoad(_)));
    }
}
