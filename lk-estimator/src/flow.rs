//! # Sparse optical flow
//!
//! Coarse-to-fine iterative Lucas-Kanade tracking of individual points between two frames.

use crate::pyramid::{self, Level, Pyramid};
use image::GrayImage;
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Lucas-Kanade tracking parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Side of the square window matched around every point.
    pub window: usize,
    /// Number of pyramid levels above the full resolution frame.
    pub max_level: usize,
    /// Iteration limit per pyramid level.
    pub max_iters: usize,
    /// Iterations stop once the update step is shorter than this.
    pub epsilon: f32,
    /// Minimal eigenvalue of the window's structure tensor, normalised by window area.
    pub min_eigen: f32,
    /// Maximal mean absolute intensity difference of a tracked window.
    pub max_residual: f32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window: 15,
            max_level: 2,
            max_iters: 10,
            epsilon: 0.03,
            min_eigen: 1e-4,
            max_residual: 20.0,
        }
    }
}

/// Tracked location of a single point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowResult {
    pub point: na::Point2<f32>,
    pub tracked: bool,
}

impl FlowResult {
    fn lost(point: na::Point2<f32>) -> Self {
        Self {
            point,
            tracked: false,
        }
    }
}

/// Failure of flow computation for a whole frame pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowError {
    NoPoints,
    FrameTooSmall { width: u32, height: u32 },
    SizeMismatch { prev: (u32, u32), next: (u32, u32) },
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NoPoints => write!(f, "no points to track"),
            Self::FrameTooSmall { width, height } => {
                write!(f, "frame of {width}x{height} is too small to track in")
            }
            Self::SizeMismatch { prev, next } => write!(
                f,
                "frame size changed from {}x{} to {}x{}",
                prev.0, prev.1, next.0, next.1
            ),
        }
    }
}

impl std::error::Error for FlowError {}

/// Track points from `prev` to `next`.
///
/// The result holds one entry per input point, in the same order. Points flagged as not tracked
/// keep their original coordinates and must not be used downstream.
///
/// # Arguments
///
/// * `prev` - frame the points were observed in.
/// * `next` - frame to find the points in.
/// * `points` - points to track.
/// * `config` - tracking parameters.
pub fn track_points(
    prev: &GrayImage,
    next: &GrayImage,
    points: &[na::Point2<f32>],
    config: &FlowConfig,
) -> Result<Vec<FlowResult>, FlowError> {
    if prev.dimensions() != next.dimensions() {
        return Err(FlowError::SizeMismatch {
            prev: prev.dimensions(),
            next: next.dimensions(),
        });
    }

    let (width, height) = prev.dimensions();
    let window = config.window.max(3);

    if (width as usize) < window || (height as usize) < window {
        return Err(FlowError::FrameTooSmall { width, height });
    }

    if points.is_empty() {
        return Err(FlowError::NoPoints);
    }

    let prev_pyr = Pyramid::build(prev, config.max_level, window);
    let next_pyr = Pyramid::build(next, config.max_level, window);

    let tracker = PointTracker {
        config,
        half: (window / 2) as isize,
    };

    Ok(points
        .iter()
        .map(|&p| tracker.track(&prev_pyr, &next_pyr, p))
        .collect())
}

struct PointTracker<'a> {
    config: &'a FlowConfig,
    half: isize,
}

/// Template window sampled around a point of the previous frame.
struct Patch {
    /// `(intensity, gradient)` per window pixel.
    samples: Vec<(f32, na::Vector2<f32>)>,
    inv_hessian: na::Matrix2<f32>,
}

impl<'a> PointTracker<'a> {
    fn offsets(&self) -> impl Iterator<Item = na::Vector2<f32>> {
        let half = self.half;
        (-half..=half).flat_map(move |dy| {
            (-half..=half).map(move |dx| na::Vector2::new(dx as f32, dy as f32))
        })
    }

    fn patch(&self, level: &Level, pt: na::Point2<f32>) -> Option<Patch> {
        let mut hessian = na::Matrix2::zeros();

        let samples = self
            .offsets()
            .map(|o| {
                let p = pt + o;
                let i = pyramid::sample(&level.img, p.x, p.y);
                let g = na::Vector2::new(
                    pyramid::sample(&level.gx, p.x, p.y),
                    pyramid::sample(&level.gy, p.x, p.y),
                );
                hessian += g * g.transpose();
                (i, g)
            })
            .collect::<Vec<_>>();

        let area = samples.len() as f32;
        let (a, b, c) = (hessian[(0, 0)], hessian[(0, 1)], hessian[(1, 1)]);
        let min_eigen = ((a + c) - ((a - c) * (a - c) + 4.0 * b * b).sqrt()) / (2.0 * area);

        if min_eigen < self.config.min_eigen {
            return None;
        }

        hessian
            .try_inverse()
            .map(|inv_hessian| Patch {
                samples,
                inv_hessian,
            })
    }

    /// Mean absolute difference between the template and the window at `pt`.
    fn residual(&self, patch: &Patch, next: &Level, pt: na::Point2<f32>) -> f32 {
        let sum: f32 = self
            .offsets()
            .zip(&patch.samples)
            .map(|(o, (i, _))| {
                let p = pt + o;
                (i - pyramid::sample(&next.img, p.x, p.y)).abs()
            })
            .sum();
        sum / patch.samples.len() as f32
    }

    /// Iteratively refine `guess` on a single level.
    ///
    /// Returns `None` if the estimate leaves the frame.
    fn refine(
        &self,
        patch: &Patch,
        next: &Level,
        mut guess: na::Point2<f32>,
    ) -> Option<na::Point2<f32>> {
        let eps_sq = self.config.epsilon * self.config.epsilon;
        let mut prev_delta = na::Vector2::zeros();

        for iter in 0..self.config.max_iters {
            if !next.contains(guess) {
                return None;
            }

            let b: na::Vector2<f32> = self
                .offsets()
                .zip(&patch.samples)
                .map(|(o, (i, g))| {
                    let p = guess + o;
                    g * (i - pyramid::sample(&next.img, p.x, p.y))
                })
                .sum();

            let delta = patch.inv_hessian * b;
            guess += delta;

            if delta.norm_squared() <= eps_sq {
                break;
            }

            // Oscillating between two solutions, settle in the middle.
            if iter > 0 && (delta + prev_delta).norm_squared() < 1e-4 {
                guess -= delta * 0.5;
                break;
            }

            prev_delta = delta;
        }

        next.contains(guess).then(|| guess)
    }

    fn track(&self, prev: &Pyramid, next: &Pyramid, point: na::Point2<f32>) -> FlowResult {
        let levels = prev.levels.len().min(next.levels.len());
        let top = levels - 1;
        let half = self.half as f32;

        // Windows must not touch the border, where samples are clamped.
        if !prev.levels[0].contains_window(point, half) {
            return FlowResult::lost(point);
        }

        let mut guess = point * (1.0 / (1 << top) as f32);
        let mut finest_patch = None;

        for level in (0..levels).rev() {
            let scale = 1.0 / (1 << level) as f32;
            let prev_pt = point * scale;
            let (prev_level, next_level) = (&prev.levels[level], &next.levels[level]);

            let refined = if prev_level.contains_window(prev_pt, half) {
                self.patch(prev_level, prev_pt)
                    .and_then(|patch| {
                        self.refine(&patch, next_level, guess)
                            .map(|guess| (patch, guess))
                    })
            } else {
                None
            };

            match refined {
                Some((patch, refined)) => {
                    guess = refined;
                    if level == 0 {
                        finest_patch = Some(patch);
                    }
                }
                // Coarse levels may fail or not fit the point, the finer ones may still recover.
                None if level > 0 => {}
                None => return FlowResult::lost(point),
            }

            if level > 0 {
                guess = guess * 2.0;
            }
        }

        let finest = &next.levels[0];

        match finest_patch {
            Some(patch)
                if finest.contains_window(guess, half)
                    && self.residual(&patch, finest, guess) <= self.config.max_residual =>
            {
                FlowResult {
                    point: guess,
                    tracked: true,
                }
            }
            _ => FlowResult::lost(point),
        }
    }
}
