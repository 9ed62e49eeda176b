//! # Video frames

use crate::prelude::v1::*;
use image::{GrayImage, Luma, RgbImage};
use std::path::{Path, PathBuf};

/// Colour frame as it comes out of the video collaborator.
pub type Frame = RgbImage;

/// Grayscale working representation of a frame.
pub type GrayFrame = GrayImage;

/// Convert a colour frame to its grayscale working representation.
///
/// Uses ITU-R BT.601 luma weights, rounded to the nearest intensity.
pub fn to_gray(frame: &Frame) -> GrayFrame {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Load a single frame from an image file.
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| anyhow!("unable to load frame {}: {e}", path.display()))
}

/// List frame images inside a directory, sorted by file name.
///
/// Only files with a known image extension are returned.
pub fn list_frames(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

    let mut frames = std::fs::read_dir(dir.as_ref())?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    frames.sort();

    Ok(frames)
}
