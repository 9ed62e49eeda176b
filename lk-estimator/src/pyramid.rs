//! Floating point image planes and Gaussian pyramids.
//!
//! Planes are stored as `rows x cols` matrices, so pixel `(x, y)` lives at `(y, x)`.

use image::GrayImage;
use nalgebra as na;

pub type Plane = na::DMatrix<f32>;

/// Convert a grayscale image to a floating point plane.
pub fn from_gray(img: &GrayImage) -> Plane {
    let (w, h) = img.dimensions();
    Plane::from_fn(h as usize, w as usize, |y, x| {
        img.get_pixel(x as u32, y as u32).0[0] as f32
    })
}

/// Central difference gradients, with replicated borders.
pub fn gradients(p: &Plane) -> (Plane, Plane) {
    let (rows, cols) = p.shape();

    let gx = Plane::from_fn(rows, cols, |y, x| {
        let l = x.saturating_sub(1);
        let r = (x + 1).min(cols - 1);
        (p[(y, r)] - p[(y, l)]) * 0.5
    });

    let gy = Plane::from_fn(rows, cols, |y, x| {
        let t = y.saturating_sub(1);
        let b = (y + 1).min(rows - 1);
        (p[(b, x)] - p[(t, x)]) * 0.5
    });

    (gx, gy)
}

/// Sum over a `(2 * radius + 1)` square window around every pixel.
///
/// The window is cut off at the plane boundaries.
pub fn box_sum(p: &Plane, radius: usize) -> Plane {
    let (rows, cols) = p.shape();

    // Separable: horizontal pass, then vertical.
    let h = Plane::from_fn(rows, cols, |y, x| {
        let lo = x.saturating_sub(radius);
        let hi = (x + radius).min(cols - 1);
        (lo..=hi).map(|i| p[(y, i)]).sum()
    });

    Plane::from_fn(rows, cols, |y, x| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(rows - 1);
        (lo..=hi).map(|i| h[(i, x)]).sum()
    })
}

/// Blur with a 5-tap binomial kernel and drop every other row and column.
pub fn pyr_down(p: &Plane) -> Plane {
    const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

    let (rows, cols) = p.shape();
    let clamp = |v: isize, max: usize| v.clamp(0, max as isize - 1) as usize;

    let h = Plane::from_fn(rows, (cols + 1) / 2, |y, x| {
        KERNEL
            .iter()
            .enumerate()
            .map(|(k, w)| w * p[(y, clamp(2 * x as isize + k as isize - 2, cols))])
            .sum()
    });

    Plane::from_fn((rows + 1) / 2, h.ncols(), |y, x| {
        KERNEL
            .iter()
            .enumerate()
            .map(|(k, w)| w * h[(clamp(2 * y as isize + k as isize - 2, rows), x)])
            .sum()
    })
}

/// Sample a plane with bilinear interpolation.
///
/// Coordinates outside the plane are clamped to its border.
pub fn sample(p: &Plane, x: f32, y: f32) -> f32 {
    let (rows, cols) = p.shape();

    let x = x.clamp(0.0, (cols - 1) as f32);
    let y = y.clamp(0.0, (rows - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(cols - 1);
    let y1 = (y0 + 1).min(rows - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = p[(y0, x0)] * (1.0 - fx) + p[(y0, x1)] * fx;
    let bottom = p[(y1, x0)] * (1.0 - fx) + p[(y1, x1)] * fx;

    top * (1.0 - fy) + bottom * fy
}

/// Single pyramid level, with precomputed gradients.
pub struct Level {
    pub img: Plane,
    pub gx: Plane,
    pub gy: Plane,
}

impl Level {
    fn new(img: Plane) -> Self {
        let (gx, gy) = gradients(&img);
        Self { img, gx, gy }
    }

    pub fn contains(&self, pt: na::Point2<f32>) -> bool {
        self.contains_window(pt, 0.0)
    }

    /// Whether the square window of half-size `half` around `pt` lies fully within the level.
    pub fn contains_window(&self, pt: na::Point2<f32>, half: f32) -> bool {
        let (rows, cols) = self.img.shape();
        pt.x - half >= 0.0
            && pt.y - half >= 0.0
            && pt.x + half <= (cols - 1) as f32
            && pt.y + half <= (rows - 1) as f32
    }
}

/// Gaussian image pyramid, finest level first.
pub struct Pyramid {
    pub levels: Vec<Level>,
}

impl Pyramid {
    /// Build a pyramid of up to `max_level + 1` levels.
    ///
    /// Levels stop being added once the next one would be smaller than `min_size` on either axis.
    pub fn build(img: &GrayImage, max_level: usize, min_size: usize) -> Self {
        let mut levels = vec![Level::new(from_gray(img))];

        for _ in 0..max_level {
            let Some(last) = levels.last() else {
                break;
            };
            let (rows, cols) = last.img.shape();
            if (rows + 1) / 2 < min_size || (cols + 1) / 2 < min_size {
                break;
            }
            let next = pyr_down(&last.img);
            levels.push(Level::new(next));
        }

        Self { levels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn bilinear_between_pixels() {
        let p = Plane::from_row_slice(2, 2, &[0.0, 10.0, 20.0, 30.0]);
        assert_approx_eq!(sample(&p, 0.5, 0.0), 5.0);
        assert_approx_eq!(sample(&p, 0.5, 0.5), 15.0);
        assert_approx_eq!(sample(&p, 5.0, -3.0), 10.0);
    }

    #[test]
    fn gradient_of_ramp() {
        let p = Plane::from_fn(5, 5, |_, x| x as f32 * 2.0);
        let (gx, gy) = gradients(&p);
        assert_approx_eq!(gx[(2, 2)], 2.0);
        assert_approx_eq!(gy[(2, 2)], 0.0);
    }

    #[test]
    fn box_sum_cuts_at_borders() {
        let p = Plane::repeat(4, 4, 1.0);
        let s = box_sum(&p, 1);
        assert_approx_eq!(s[(0, 0)], 4.0);
        assert_approx_eq!(s[(1, 1)], 9.0);
    }

    #[test]
    fn window_containment() {
        let level = Level::new(Plane::zeros(20, 30));
        let half = 7.0;

        assert!(level.contains_window(na::Point2::new(7.0, 7.0), half));
        assert!(level.contains_window(na::Point2::new(22.0, 12.0), half));
        assert!(!level.contains_window(na::Point2::new(6.5, 10.0), half));
        assert!(!level.contains_window(na::Point2::new(22.5, 10.0), half));
        assert!(!level.contains_window(na::Point2::new(15.0, 12.5), half));
        assert!(level.contains(na::Point2::new(0.0, 19.0)));
    }

    #[test]
    fn pyramid_halves_and_preserves_constants() {
        let img = GrayImage::from_pixel(64, 48, image::Luma([77]));
        let pyr = Pyramid::build(&img, 2, 8);
        assert_eq!(pyr.levels.len(), 3);
        assert_eq!(pyr.levels[1].img.shape(), (24, 32));
        assert_eq!(pyr.levels[2].img.shape(), (12, 16));
        assert_approx_eq!(pyr.levels[2].img[(5, 5)], 77.0, 1e-3);
    }

    #[test]
    fn pyramid_stops_when_too_small() {
        let img = GrayImage::new(20, 20);
        let pyr = Pyramid::build(&img, 4, 8);
        assert_eq!(pyr.levels.len(), 2);
    }
}
