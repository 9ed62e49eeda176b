//! # Per-frame camera movement

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Estimated camera displacement for a single frame transition, in pixels.
///
/// A movement sequence holds one entry per input frame, and the first entry is always zero,
/// since there is no prior frame to compare against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub dx: f32,
    pub dy: f32,
}

impl Movement {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    pub fn as_vector(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.dx, self.dy)
    }
}

impl From<na::Vector2<f32>> for Movement {
    fn from(v: na::Vector2<f32>) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Create an all-zero movement sequence for `len` frames.
pub fn zeroed(len: usize) -> Vec<Movement> {
    vec![Movement::ZERO; len]
}
