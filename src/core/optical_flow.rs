// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sparse pyramidal Lucas-Kanade optical flow.
//!
//! Each point is tracked from the coarsest pyramid level to the full resolution.
//! At each level, a translation of the window around the point is estimated
//! by Gauss-Newton iterations, with the Hessian computed once
//! from the gradients of the previous image (forward additive formulation).

use nalgebra::DMatrix;

use crate::core::{gradient, multires};
use crate::misc::type_aliases::{Float, GrayMatrix, Mat2, Point2, Vec2};

/// Configuration of the optical flow tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Side of the square integration window, in pixels.
    pub window_size: usize,
    /// Index of the coarsest pyramid level, 0 means no pyramid.
    pub max_level: usize,
    /// Maximum number of Gauss-Newton iterations per level.
    pub max_iterations: usize,
    /// Iterations stop when the update is smaller than this, in pixels.
    pub epsilon: Float,
    /// Minimum eigen value of the window structure tensor,
    /// normalized by the number of pixels in the window.
    /// Points below are considered untrackable.
    pub min_eigen: Float,
    /// Maximum mean absolute intensity difference between the window
    /// and its tracked position at full resolution.
    pub max_residual: Float,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window_size: 11,
            max_level: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen: 1e-3,
            max_residual: 12.0,
        }
    }
}

/// Pyramidal Lucas-Kanade tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LucasKanade {
    /// Configuration of the tracker.
    pub config: Config,
}

/// Pyramid of an image with the gradients of each level.
struct Level {
    img: GrayMatrix,
    gx: DMatrix<Float>,
    gy: DMatrix<Float>,
}

/// Window pixel sampled in the previous image: position, intensity and gradient.
type Sample = (Float, Float, Float, Float, Float);

/// Converged flow at one level, with the mean absolute residual of the window.
struct Refined {
    flow: Vec2,
    residual: Float,
}

impl LucasKanade {
    /// Create a tracker with the given configuration.
    pub fn new(config: Config) -> LucasKanade {
        LucasKanade { config }
    }

    /// Track points of `prev` into `next`.
    ///
    /// The result is index aligned with `points`.
    /// A point is `None` if it could not be tracked: its window leaves the
    /// full resolution image, it has not enough texture, the iterations do not
    /// converge, or the tracked window differs too much from the original one.
    ///
    /// Coarse pyramid levels replicate the image border,
    /// so points close to the border still get a coarse estimate.
    pub fn track(&self, prev: &GrayMatrix, next: &GrayMatrix, points: &[Point2]) -> Vec<Option<Point2>> {
        if points.is_empty() {
            return Vec::new();
        }
        let nb_levels = self.config.max_level + 1;
        let prev_pyramid: Vec<Level> = multires::mean_pyramid(nb_levels, prev.clone())
            .into_iter()
            .map(|img| {
                let (gx, gy) = gradient::centered(&img);
                Level { img, gx, gy }
            })
            .collect();
        let next_pyramid = multires::mean_pyramid(nb_levels, next.clone());
        let levels = prev_pyramid.len().min(next_pyramid.len());

        points
            .iter()
            .map(|p| {
                let mut flow = Vec2::zeros();
                for level in (1..levels).rev() {
                    let x = multires::to_level(p.x, level);
                    let y = multires::to_level(p.y, level);
                    // Without convergence, keep the coarser guess.
                    if let Some(refined) = self.refine(&prev_pyramid[level], &next_pyramid[level], x, y, flow, true) {
                        flow = refined.flow;
                    }
                    flow *= 2.0;
                }
                let refined = self.refine(&prev_pyramid[0], next, p.x, p.y, flow, false)?;
                if refined.residual > self.config.max_residual {
                    return None;
                }
                Some(*p + refined.flow)
            })
            .collect()
    }

    /// Refine the flow of a point at one pyramid level, starting from `guess`.
    /// Returns `None` if the point is untrackable or the iterations do not converge.
    #[allow(clippy::cast_possible_wrap)]
    #[allow(clippy::cast_precision_loss)]
    fn refine(
        &self,
        prev: &Level,
        next: &GrayMatrix,
        x: Float,
        y: Float,
        guess: Vec2,
        clamp: bool,
    ) -> Option<Refined> {
        let half = (self.config.window_size / 2) as i32;
        let mut samples: Vec<Sample> = Vec::with_capacity(self.config.window_size.pow(2));
        let mut hessian = Mat2::zeros();
        for dy in -half..=half {
            for dx in -half..=half {
                let wx = x + Float::from(dx);
                let wy = y + Float::from(dy);
                let intensity = sample(wx, wy, &prev.img, clamp)?;
                let ix = sample(wx, wy, &prev.gx, clamp)?;
                let iy = sample(wx, wy, &prev.gy, clamp)?;
                hessian += Mat2::new(ix * ix, ix * iy, ix * iy, iy * iy);
                samples.push((wx, wy, intensity, ix, iy));
            }
        }
        let nb_samples = samples.len() as Float;
        if min_eigen_value(&hessian) / nb_samples < self.config.min_eigen {
            return None;
        }
        let hessian_inv = hessian.try_inverse()?;
        let mut flow = guess;
        for _ in 0..self.config.max_iterations {
            let (b, _) = mismatch(&samples, next, flow, clamp)?;
            let step = hessian_inv * b;
            flow += step;
            if step.norm() < self.config.epsilon {
                let (_, residual) = mismatch(&samples, next, flow, clamp)?;
                return Some(Refined { flow, residual });
            }
        }
        None
    }
}

/// Interpolated value, replicating the border if `clamp` is true.
fn sample<T>(x: Float, y: Float, mat: &DMatrix<T>, clamp: bool) -> Option<Float>
where
    T: nalgebra::Scalar + Copy + Into<Float>,
{
    if clamp {
        Some(gradient::interpolate_clamped(x, y, mat))
    } else {
        gradient::interpolate(x, y, mat)
    }
}

/// Steepest descent vector and mean absolute residual of the window
/// displaced by `flow` in the next image.
#[allow(clippy::cast_precision_loss)]
fn mismatch(samples: &[Sample], next: &GrayMatrix, flow: Vec2, clamp: bool) -> Option<(Vec2, Float)> {
    let mut b = Vec2::zeros();
    let mut abs_sum = 0.0;
    for &(wx, wy, intensity, ix, iy) in samples.iter() {
        let diff = intensity - sample(wx + flow.x, wy + flow.y, next, clamp)?;
        b += Vec2::new(ix * diff, iy * diff);
        abs_sum += diff.abs();
    }
    Some((b, abs_sum / samples.len() as Float))
}

/// Smallest eigen value of a symmetric 2x2 matrix.
fn min_eigen_value(m: &Mat2) -> Float {
    let a = m[(0, 0)];
    let b = m[(0, 1)];
    let c = m[(1, 1)];
    let half_diff = 0.5 * (a - c);
    0.5 * (a + c) - (half_diff * half_diff + b * b).sqrt()
}

// TESTS #############################################################
