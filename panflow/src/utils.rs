//! # Utility module
//!
//! Scalar geometry helpers shared by estimators and track processing. All of them tolerate NaN
//! input, which the detection collaborator produces for interpolated or missing boxes.

use nalgebra as na;

/// Bounding box in `[x1, y1, x2, y2]` form.
pub type BBox = [f32; 4];

fn has_nan(coords: &[f32]) -> bool {
    coords.iter().any(|c| c.is_nan())
}

/// Euclidean distance between two points.
///
/// Returns infinity if any coordinate is NaN.
pub fn measure_distance(p1: na::Point2<f32>, p2: na::Point2<f32>) -> f32 {
    if has_nan(&[p1.x, p1.y, p2.x, p2.y]) {
        return f32::INFINITY;
    }
    na::distance(&p1, &p2)
}

/// Signed per-axis difference `p1 - p2`.
///
/// Returns a zero vector if any coordinate is NaN.
pub fn measure_xy_distance(p1: na::Point2<f32>, p2: na::Point2<f32>) -> na::Vector2<f32> {
    if has_nan(&[p1.x, p1.y, p2.x, p2.y]) {
        return na::Vector2::zeros();
    }
    p1 - p2
}

/// Centre of a bounding box, or `None` if the box contains NaN.
pub fn center_of_bbox(bbox: BBox) -> Option<na::Point2<f32>> {
    if has_nan(&bbox) {
        return None;
    }
    let [x1, y1, x2, y2] = bbox;
    Some(na::Point2::new((x1 + x2) / 2.0, (y1 + y2) / 2.0))
}

/// Bottom centre of a bounding box (where a standing person touches the ground).
pub fn foot_position(bbox: BBox) -> Option<na::Point2<f32>> {
    if has_nan(&bbox) {
        return None;
    }
    let [x1, _, x2, y2] = bbox;
    Some(na::Point2::new((x1 + x2) / 2.0, y2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn distance_simple() {
        let d = measure_distance(na::Point2::new(0.0, 0.0), na::Point2::new(3.0, 4.0));
        assert_approx_eq!(d, 5.0);
    }

    #[test]
    fn distance_nan_is_infinite() {
        let d = measure_distance(na::Point2::new(f32::NAN, 0.0), na::Point2::new(3.0, 4.0));
        assert!(d.is_infinite());
    }

    #[test]
    fn xy_distance_is_signed() {
        let v = measure_xy_distance(na::Point2::new(10.0, 5.0), na::Point2::new(4.0, 8.0));
        assert_eq!(v, na::Vector2::new(6.0, -3.0));

        let v = measure_xy_distance(na::Point2::new(1.0, 1.0), na::Point2::new(1.0, f32::NAN));
        assert_eq!(v, na::Vector2::zeros());
    }

    #[test]
    fn bbox_helpers() {
        let bbox = [10.0, 20.0, 30.0, 60.0];
        assert_eq!(center_of_bbox(bbox), Some(na::Point2::new(20.0, 40.0)));
        assert_eq!(foot_position(bbox), Some(na::Point2::new(20.0, 60.0)));

        let nan = [f32::NAN, 20.0, 30.0, 60.0];
        assert_eq!(center_of_bbox(nan), None);
        assert_eq!(foot_position(nan), None);
    }
}
