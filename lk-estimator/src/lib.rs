//! # Sparse Lucas-Kanade camera pan estimator.
//!
//! This estimator follows a sparse set of features selected near the edges of the frame, where
//! static scenery is expected, and tracks them with pyramidal Lucas-Kanade optical flow. The
//! largest displacement among the tracked features becomes the camera movement of each frame,
//! unless it is small enough to be considered noise.
//!
//! Estimation is a fold over the frame sequence: [`TrackingState`] carries the previous frame and
//! feature set from one [`LkEstimator::step`] to the next.

use log::*;
use nalgebra as na;
use panflow::frame::to_gray;
use panflow::movement;
use panflow::prelude::v1::*;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod features;
pub mod flow;
mod pyramid;

use aggregate::{Aggregate, AggregatorConfig, FeatureUpdate};
use features::{select_features, FeatureConfig};
use flow::{track_points, FlowConfig};

/// Complete estimator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LkSettings {
    pub motion: AggregatorConfig,
    /// Feature detection used on the first frame of a sequence.
    pub strict: FeatureConfig,
    /// Feature detection used if the strict configuration finds nothing on the first frame.
    pub relaxed: FeatureConfig,
    pub flow: FlowConfig,
}

impl Default for LkSettings {
    fn default() -> Self {
        Self {
            motion: AggregatorConfig::default(),
            strict: FeatureConfig::strict(),
            relaxed: FeatureConfig::relaxed(),
            flow: FlowConfig::default(),
        }
    }
}

/// State carried between two frame transitions.
pub struct TrackingState {
    prev: GrayFrame,
    /// `None` when features have to be re-detected before the next transition.
    features: Option<Vec<na::Point2<f32>>>,
}

impl TrackingState {
    pub fn new(prev: GrayFrame, features: Option<Vec<na::Point2<f32>>>) -> Self {
        Self { prev, features }
    }

    pub fn features(&self) -> Option<&[na::Point2<f32>]> {
        self.features.as_deref()
    }
}

/// Camera pan estimator built on sparse Lucas-Kanade optical flow.
#[derive(Clone, Debug, Default)]
pub struct LkEstimator {
    settings: LkSettings,
}

impl Properties for LkEstimator {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        let LkSettings {
            motion,
            strict,
            flow,
            ..
        } = &mut self.settings;

        vec![
            (
                "Min movement",
                PropertyMut::float(&mut motion.min_movement, 0.0, 100.0),
            ),
            (
                "Refresh interval",
                PropertyMut::usize(&mut motion.refresh_interval, 0, 10000),
            ),
            (
                "Max corners",
                PropertyMut::usize(&mut strict.max_corners, 1, 5000),
            ),
            (
                "Quality level",
                PropertyMut::float(&mut strict.quality_level, 0.0001, 1.0),
            ),
            (
                "Min distance",
                PropertyMut::float(&mut strict.min_distance, 0.0, 200.0),
            ),
            (
                "Block size",
                PropertyMut::usize(&mut strict.block_size, 3, 31),
            ),
            ("Window size", PropertyMut::usize(&mut flow.window, 3, 63)),
            ("Max level", PropertyMut::usize(&mut flow.max_level, 0, 6)),
            ("Max iters", PropertyMut::usize(&mut flow.max_iters, 1, 100)),
            ("Epsilon", PropertyMut::float(&mut flow.epsilon, 0.0001, 1.0)),
            (
                "Max residual",
                PropertyMut::float(&mut flow.max_residual, 0.0, 255.0),
            ),
        ]
    }
}

impl LkEstimator {
    pub fn new(settings: LkSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LkSettings {
        &self.settings
    }

    pub fn min_movement(mut self, min_movement: f32) -> Self {
        self.settings.motion.min_movement = min_movement;
        self
    }

    pub fn refresh_interval(mut self, refresh_interval: usize) -> Self {
        self.settings.motion.refresh_interval = refresh_interval;
        self
    }

    /// Set the minimal feature spacing of the strict detection configuration.
    pub fn min_distance(mut self, min_distance: f32) -> Self {
        self.settings.strict.min_distance = min_distance;
        self
    }

    pub fn flow(mut self, flow: FlowConfig) -> Self {
        self.settings.flow = flow;
        self
    }

    /// Select features on the first frame of a sequence.
    ///
    /// Falls back to the relaxed configuration if the strict one finds nothing. Returns the
    /// configuration that succeeded along with its features, which is then used for the rest of
    /// the sequence.
    pub fn initial_features(
        &self,
        frame: &GrayFrame,
    ) -> Option<(&FeatureConfig, Vec<na::Point2<f32>>)> {
        if let Some(features) = select_features(frame, &self.settings.strict) {
            return Some((&self.settings.strict, features));
        }

        info!("No features found in first frame, using relaxed detection parameters");

        select_features(frame, &self.settings.relaxed).map(|f| (&self.settings.relaxed, f))
    }

    /// Process a single frame transition.
    ///
    /// Consumes the state left by the previous transition and returns the camera movement of
    /// frame `frame_num` along with the state for the next one. Failures produce zero movement and
    /// schedule feature re-detection.
    ///
    /// # Arguments
    ///
    /// * `state` - state after the previous frame.
    /// * `frame_num` - index of `frame` within the sequence.
    /// * `frame` - current grayscale frame.
    /// * `detection` - feature detection configuration of this sequence.
    pub fn step(
        &self,
        state: TrackingState,
        frame_num: usize,
        frame: GrayFrame,
        detection: &FeatureConfig,
    ) -> (Movement, TrackingState) {
        let TrackingState { prev, features } = state;

        let features = match features.filter(|f| !f.is_empty()) {
            Some(features) => features,
            None => match select_features(&prev, detection) {
                Some(features) => features,
                None => {
                    debug!("No features to track at frame {frame_num}");
                    return (Movement::ZERO, TrackingState::new(frame, None));
                }
            },
        };

        let aggregate = match track_points(&prev, &frame, &features, &self.settings.flow) {
            Ok(results) => {
                let pairs = features
                    .iter()
                    .zip(results)
                    .filter(|(_, r)| r.tracked)
                    .map(|(&old, r)| (old, r.point))
                    .collect::<Vec<_>>();

                aggregate::aggregate(frame_num, &pairs, &self.settings.motion)
            }
            Err(e) => {
                debug!("Error in optical flow at frame {frame_num}: {e}");
                Aggregate::reset()
            }
        };

        let features = match aggregate.update {
            FeatureUpdate::Keep => Some(features),
            FeatureUpdate::Replace(features) => Some(features),
            FeatureUpdate::Redetect => select_features(&frame, detection),
        };

        (aggregate.movement, TrackingState::new(frame, features))
    }
}

impl MovementEstimator for LkEstimator {
    fn estimate(&mut self, frames: &[Frame]) -> Vec<Movement> {
        let mut camera_movement = movement::zeroed(frames.len());

        let Some(first) = frames.first() else {
            return camera_movement;
        };

        let first = to_gray(first);

        let Some((detection, features)) = self.initial_features(&first) else {
            warn!("No features detected, camera movement will be zero");
            return camera_movement;
        };

        info!(
            "Found {} features for camera movement tracking",
            features.len()
        );

        let mut state = TrackingState::new(first, Some(features));

        for (frame_num, frame) in frames.iter().enumerate().skip(1) {
            let (movement, next) = self.step(state, frame_num, to_gray(frame), detection);
            camera_movement[frame_num] = movement;
            state = next;
        }

        camera_movement
    }
}
