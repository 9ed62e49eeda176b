//! # Camera Pan Estimation Library
//!
//! This library provides a framework for estimating the apparent motion of a camera across a
//! video sequence, and for using those estimates to move object tracks into a camera-stabilized
//! coordinate frame. Concrete estimators live in their own crates and implement the
//! [`MovementEstimator`](estimator::MovementEstimator) trait.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use panflow::prelude::v1::*;
//! ```
//!
//! You may need [`nalgebra`](https://crates.io/crates/nalgebra) to make use of the functionality.

pub mod batch;
pub mod cache;
pub mod estimator;
pub mod frame;
pub mod movement;
pub mod overlay;
pub mod properties;
pub mod tracks;
pub mod utils;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            batch::process_in_batches,
            cache::{FileStore, MovementStore},
            estimator::MovementEstimator,
            frame::{Frame, GrayFrame},
            movement::Movement,
            overlay::draw_camera_movement,
            properties::*,
            tracks::{FrameTracks, TrackInfo, Tracks},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
