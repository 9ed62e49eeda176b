//! # Camera movement estimator

use crate::cache;
use crate::prelude::v1::*;

/// Generic camera movement estimator
pub trait MovementEstimator {
    /// Estimate camera movement over a sequence of frames.
    ///
    /// Every call starts from a fresh tracking state, so independent sequences (for instance
    /// batches of a longer video) never influence each other. The result always contains exactly
    /// one entry per input frame, with the first entry being zero. Estimation failures never
    /// surface as errors, they degrade into zero movement for the affected frames instead.
    ///
    /// # Arguments
    ///
    /// * `frames` - ordered frames of the sequence.
    fn estimate(&mut self, frames: &[Frame]) -> Vec<Movement>;

    /// Estimate camera movement, reusing a previously stored result when possible.
    ///
    /// If `store` holds an entry for `key` covering as many frames as `frames`, it is returned
    /// unchanged. Otherwise the movement is estimated and written back. Storage failures are
    /// logged and otherwise ignored.
    ///
    /// # Arguments
    ///
    /// * `frames` - ordered frames of the sequence.
    /// * `store` - persistence backend.
    /// * `key` - name of the entry within the store.
    fn estimate_cached(
        &mut self,
        frames: &[Frame],
        store: &dyn MovementStore,
        key: &str,
    ) -> Vec<Movement> {
        cache::get_or_compute(store, key, frames.len(), || self.estimate(frames))
    }
}
