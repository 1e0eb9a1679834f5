//! Utility functions for the detection pipeline.

pub mod image;

pub use image::{load_image, load_images, to_rgb};
