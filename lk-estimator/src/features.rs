//! # Feature selection
//!
//! Picks sparse, well-textured points worth tracking, using the minimum eigenvalue of the
//! gradient structure tensor ("good features to track").

use crate::pyramid::{self, Plane};
use image::GrayImage;
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Feature detection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Maximum number of features returned.
    pub max_corners: usize,
    /// Minimal accepted response, relative to the strongest one.
    pub quality_level: f32,
    /// Minimal distance between any two returned features.
    pub min_distance: f32,
    /// Side of the window the structure tensor is summed over.
    pub block_size: usize,
    /// Width of the frame border features are restricted to, as a fraction of each dimension.
    ///
    /// Moving foreground objects are expected in the middle of the frame, so with `Some(0.1)`
    /// only the outer 10% on every side is searched. `None` searches the whole frame.
    pub border: Option<f32>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl FeatureConfig {
    /// Configuration used for the first detection attempt of a sequence.
    pub fn strict() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.1,
            min_distance: 10.0,
            block_size: 7,
            border: Some(0.1),
        }
    }

    /// Fallback for frames where the strict configuration finds nothing.
    pub fn relaxed() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.01,
            min_distance: 5.0,
            block_size: 7,
            border: None,
        }
    }

    /// Whether pixel `(x, y)` may hold a feature in a `width x height` frame.
    fn allows(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        match self.border {
            None => true,
            Some(border) => {
                let border = border.clamp(0.0, 0.5);
                let x0 = (width as f32 * border) as usize;
                let y0 = (height as f32 * border) as usize;
                !((x0..width - x0).contains(&x) && (y0..height - y0).contains(&y))
            }
        }
    }
}

/// Minimum eigenvalue of the structure tensor at every pixel.
///
/// Pixels whose window does not fit into the frame get zero response.
fn min_eigen_response(img: &Plane, block_size: usize) -> Plane {
    let (gx, gy) = pyramid::gradients(img);
    let radius = block_size / 2;

    let sxx = pyramid::box_sum(&gx.component_mul(&gx), radius);
    let syy = pyramid::box_sum(&gy.component_mul(&gy), radius);
    let sxy = pyramid::box_sum(&gx.component_mul(&gy), radius);

    let (rows, cols) = img.shape();
    let margin = radius + 1;

    Plane::from_fn(rows, cols, |y, x| {
        if y < margin || x < margin || y + margin >= rows || x + margin >= cols {
            return 0.0;
        }
        let (a, b, c) = (sxx[(y, x)], sxy[(y, x)], syy[(y, x)]);
        let half_trace = (a + c) * 0.5;
        let half_diff = (a - c) * 0.5;
        (half_trace - (half_diff * half_diff + b * b).sqrt()).max(0.0)
    })
}

/// Select features to track within a frame.
///
/// Returns `None` if the frame holds no acceptable feature under the given configuration. The
/// order of the output is strongest response first, with ties broken in raster order.
///
/// # Arguments
///
/// * `frame` - grayscale frame to search.
/// * `config` - detection parameters.
pub fn select_features(frame: &GrayImage, config: &FeatureConfig) -> Option<Vec<na::Point2<f32>>> {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let margin = config.block_size / 2 + 1;

    if config.max_corners == 0 || width <= 2 * margin || height <= 2 * margin {
        return None;
    }

    let response = min_eigen_response(&pyramid::from_gray(frame), config.block_size);

    let max_response = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| config.allows(x, y, width, height))
        .map(|(x, y)| response[(y, x)])
        .fold(0.0f32, f32::max);

    if max_response <= 0.0 {
        return None;
    }

    let threshold = max_response * config.quality_level;

    let is_local_max = |x: usize, y: usize| {
        let v = response[(y, x)];
        (y.saturating_sub(1)..=(y + 1).min(height - 1)).all(|ny| {
            (x.saturating_sub(1)..=(x + 1).min(width - 1)).all(|nx| response[(ny, nx)] <= v)
        })
    };

    let mut candidates = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| config.allows(x, y, width, height))
        .filter(|&(x, y)| response[(y, x)] > threshold && is_local_max(x, y))
        .map(|(x, y)| (response[(y, x)], na::Point2::new(x as f32, y as f32)))
        .collect::<Vec<_>>();

    // Stable sort keeps raster order among equal responses.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let min_dist_sq = config.min_distance * config.min_distance;
    let mut features: Vec<na::Point2<f32>> = vec![];

    for (_, pt) in candidates {
        if features.len() >= config.max_corners {
            break;
        }
        if features
            .iter()
            .all(|f| (*f - pt).norm_squared() >= min_dist_sq)
        {
            features.push(pt);
        }
    }

    if features.is_empty() {
        None
    } else {
        Some(features)
    }
}
