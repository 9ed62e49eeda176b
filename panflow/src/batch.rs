//! # Batched estimation
//!
//! Long videos are processed in fixed-size batches to bound memory use. Each batch is estimated
//! independently, with fresh tracking state.

use crate::prelude::v1::*;
use log::*;

/// Estimate camera movement over `frames`, `batch_size` frames at a time.
///
/// Only one batch of frames is held in memory at once. Since batches are independent, the first
/// entry of every batch is zero.
///
/// # Arguments
///
/// * `estimator` - estimator to run on every batch.
/// * `frames` - ordered frames of the sequence.
/// * `batch_size` - maximum number of frames per batch. Zero is treated as one.
pub fn process_in_batches(
    estimator: &mut impl MovementEstimator,
    frames: impl IntoIterator<Item = Frame>,
    batch_size: usize,
) -> Vec<Movement> {
    let batch_size = batch_size.max(1);
    let mut frames = frames.into_iter();
    let mut movement = vec![];

    loop {
        let batch = frames.by_ref().take(batch_size).collect::<Vec<_>>();

        if batch.is_empty() {
            break;
        }

        debug!(
            "Processing batch: frames {} to {}",
            movement.len(),
            movement.len() + batch.len()
        );

        movement.extend(estimator.estimate(&batch));
    }

    movement
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Records batch sizes and reports frame indices within the batch as movement.
    #[derive(Default)]
    struct CountingEstimator {
        batches: Vec<usize>,
    }

    impl MovementEstimator for CountingEstimator {
        fn estimate(&mut self, frames: &[Frame]) -> Vec<Movement> {
            self.batches.push(frames.len());
            (0..frames.len())
                .map(|i| Movement::new(i as f32, 0.0))
                .collect()
        }
    }

    #[test]
    fn batches_are_independent() {
        let mut estimator = CountingEstimator::default();
        let frames = (0..7).map(|_| RgbImage::new(4, 4));

        let movement = process_in_batches(&mut estimator, frames, 3);

        assert_eq!(estimator.batches, vec![3, 3, 1]);
        assert_eq!(movement.len(), 7);
        assert!(movement[0].is_zero());
        assert!(movement[3].is_zero());
        assert!(movement[6].is_zero());
        assert_eq!(movement[5], Movement::new(2.0, 0.0));
    }

    #[test]
    fn empty_input() {
        let mut estimator = CountingEstimator::default();
        let movement = process_in_batches(&mut estimator, std::iter::empty(), 50);
        assert!(movement.is_empty());
        assert!(estimator.batches.is_empty());
    }
}
