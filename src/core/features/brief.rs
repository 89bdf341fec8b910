// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Steered BRIEF binary descriptors computed on a box-smoothed image.

use nalgebra::DMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{Descriptor, DESCRIPTOR_BYTES};
use crate::misc::type_aliases::{Float, GrayMatrix};

/// Radius of the described patch.
pub const PATCH_RADIUS: i32 = 15;

/// Half size of the box filter applied before intensity comparisons.
const SMOOTHING_RADIUS: i32 = 2;

/// Minimum distance to the image border for a keypoint to be described,
/// accounting for pattern rotation and smoothing.
pub const EDGE: usize = 24;

/// Random pairs of pixel offsets compared to build a descriptor.
#[derive(Debug, Clone)]
pub struct Pattern {
    pairs: Vec<[(Float, Float); 2]>,
}

impl Pattern {
    /// Generate a pattern with a seeded generator.
    /// Offsets are uniformly distributed in the patch.
    pub fn new(seed: u64) -> Pattern {
        let mut rng = StdRng::seed_from_u64(seed);
        let r = Float::from(PATCH_RADIUS);
        let mut offset = || (rng.gen_range(-r..=r), rng.gen_range(-r..=r));
        let pairs = (0..DESCRIPTOR_BYTES * 8)
            .map(|_| [offset(), offset()])
            .collect();
        Pattern { pairs }
    }

    /// Descriptor of the patch centered at `(x, y)`, with the pattern rotated by `angle`.
    ///
    /// The center must be at least `EDGE` pixels away from the borders.
    #[allow(clippy::cast_possible_truncation)]
    pub fn describe(&self, integral: &Integral, x: usize, y: usize, angle: Float) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let rotate = |(dx, dy): (Float, Float)| -> (i32, i32) {
            (
                (cos * dx - sin * dy).round() as i32,
                (sin * dx + cos * dy).round() as i32,
            )
        };
        let mut descriptor = [0; DESCRIPTOR_BYTES];
        for (i, pair) in self.pairs.iter().enumerate() {
            let (ax, ay) = rotate(pair[0]);
            let (bx, by) = rotate(pair[1]);
            let a = integral.box_sum(x as i32 + ax, y as i32 + ay, SMOOTHING_RADIUS);
            let b = integral.box_sum(x as i32 + bx, y as i32 + by, SMOOTHING_RADIUS);
            if a < b {
                descriptor[i / 8] |= 1 << (i % 8);
            }
        }
        descriptor
    }
}

/// Integral image, `sums[(y, x)]` is the sum of pixels strictly above and left of `(x, y)`.
#[derive(Debug, Clone)]
pub struct Integral {
    sums: DMatrix<u32>,
}

impl Integral {
    /// Compute the integral image of a gray image.
    pub fn new(img: &GrayMatrix) -> Integral {
        let (nrows, ncols) = img.shape();
        let mut sums = DMatrix::zeros(nrows + 1, ncols + 1);
        for y in 0..nrows {
            let mut row_sum = 0_u32;
            for x in 0..ncols {
                row_sum += u32::from(img[(y, x)]);
                sums[(y + 1, x + 1)] = sums[(y, x + 1)] + row_sum;
            }
        }
        Integral { sums }
    }

    /// Sum of the pixels in the square of given radius centered at `(x, y)`.
    /// The square is clamped to the image.
    #[allow(clippy::cast_sign_loss)]
    pub fn box_sum(&self, x: i32, y: i32, radius: i32) -> u32 {
        let (nrows, ncols) = self.sums.shape();
        let clamp = |v: i32, max: usize| v.max(0).min(max as i32 - 1) as usize;
        let x0 = clamp(x - radius, ncols);
        let y0 = clamp(y - radius, nrows);
        let x1 = clamp(x + radius + 1, ncols);
        let y1 = clamp(y + radius + 1, nrows);
        self.sums[(y1, x1)] + self.sums[(y0, x0)] - self.sums[(y0, x1)] - self.sums[(y1, x0)]
    }
}

/// Orientation of a patch by the intensity centroid method.
#[allow(clippy::cast_possible_wrap)]
pub fn orientation(img: &GrayMatrix, x: usize, y: usize) -> Float {
    let (nrows, ncols) = img.shape();
    let r2 = PATCH_RADIUS * PATCH_RADIUS;
    let mut m01 = 0.0;
    let mut m10 = 0.0;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px < 0 || py < 0 || px >= ncols as i32 || py >= nrows as i32 {
                continue;
            }
            let v = Float::from(img[(py as usize, px as usize)]);
            m10 += Float::from(dx) * v;
            m01 += Float::from(dy) * v;
        }
    }
    m01.atan2(m10)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::hamming;

    fn textured_image() -> GrayMatrix {
        GrayMatrix::from_fn(80, 80, |y, x| ((x * 37 + y * 91 + (x * y) % 13 * 17) % 256) as u8)
    }

    #[test]
    fn integral_box_sum() {
        let img = GrayMatrix::repeat(10, 12, 3);
        let integral = Integral::new(&img);
        assert_eq!(3 * 25, integral.box_sum(5, 5, 2));
        // Clamped at the top left corner: 3x3 pixels remain.
        assert_eq!(3 * 9, integral.box_sum(0, 0, 2));
    }

    #[test]
    fn same_seed_same_descriptor() {
        let img = textured_image();
        let integral = Integral::new(&img);
        let d1 = Pattern::new(7).describe(&integral, 40, 40, 0.3);
        let d2 = Pattern::new(7).describe(&integral, 40, 40, 0.3);
        assert_eq!(0, hamming(&d1, &d2));
    }

    #[test]
    fn different_patches_differ() {
        let img = textured_image();
        let integral = Integral::new(&img);
        let pattern = Pattern::new(7);
        let d1 = pattern.describe(&integral, 30, 30, 0.0);
        let d2 = pattern.describe(&integral, 50, 45, 0.0);
        assert!(hamming(&d1, &d2) > 20);
    }

    #[test]
    fn orientation_points_to_bright_side() {
        let img = GrayMatrix::from_fn(40, 40, |_, x| if x > 20 { 255 } else { 0 });
        assert!(orientation(&img, 20, 20).abs() < 1e-9);
        let img = GrayMatrix::from_fn(40, 40, |y, _| if y > 20 { 255 } else { 0 });
        let angle = orientation(&img, 20, 20);
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }
}
