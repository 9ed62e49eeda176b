//! # Motion aggregation
//!
//! Reduces the displacements of all tracked points of a frame transition into a single camera
//! movement, and decides what happens to the feature set afterwards.

use nalgebra as na;
use panflow::prelude::v1::*;
use panflow::utils::{measure_distance, measure_xy_distance};
use serde::{Deserialize, Serialize};

/// Aggregation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Displacements up to this magnitude (in pixels) are considered tracking noise.
    pub min_movement: f32,
    /// Features are re-detected on frames that are multiples of this, if the camera moved.
    ///
    /// Zero disables periodic re-detection.
    pub refresh_interval: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_movement: 5.0,
            refresh_interval: 30,
        }
    }
}

/// What to do with the feature set after a frame transition.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureUpdate {
    /// Keep tracking the current feature coordinates.
    Keep,
    /// Continue with the given (tracked) coordinates.
    Replace(Vec<na::Point2<f32>>),
    /// Select a fresh feature set from the current frame.
    Redetect,
}

/// Outcome of a single frame transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub movement: Movement,
    pub update: FeatureUpdate,
}

impl Aggregate {
    /// Zero movement, with features re-detected from the current frame.
    pub fn reset() -> Self {
        Self {
            movement: Movement::ZERO,
            update: FeatureUpdate::Redetect,
        }
    }
}

/// Aggregate the tracked point pairs of frame `frame_num`.
///
/// The pair with the largest displacement determines the camera movement, as the largest
/// displacement is the most likely to reflect the camera panning rather than tracking jitter.
/// Movement is the signed displacement `new - old` of that pair, so subtracting it from a position
/// observed in the current frame cancels the pan. Ties keep the first pair.
///
/// # Arguments
///
/// * `frame_num` - index of the current frame within the sequence.
/// * `pairs` - `(old, new)` coordinates of every successfully tracked point.
/// * `config` - aggregation parameters.
pub fn aggregate(
    frame_num: usize,
    pairs: &[(na::Point2<f32>, na::Point2<f32>)],
    config: &AggregatorConfig,
) -> Aggregate {
    if pairs.is_empty() {
        return Aggregate::reset();
    }

    let mut max_distance = 0.0;
    let mut camera_movement = na::Vector2::zeros();

    for &(old, new) in pairs {
        let distance = measure_distance(new, old);
        if distance > max_distance {
            max_distance = distance;
            camera_movement = measure_xy_distance(new, old);
        }
    }

    if max_distance > config.min_movement {
        let refresh = config.refresh_interval > 0 && frame_num % config.refresh_interval == 0;

        Aggregate {
            movement: camera_movement.into(),
            update: if refresh {
                FeatureUpdate::Redetect
            } else {
                FeatureUpdate::Keep
            },
        }
    } else {
        Aggregate {
            movement: Movement::ZERO,
            update: FeatureUpdate::Replace(pairs.iter().map(|&(_, new)| new).collect()),
        }
    }
}
