// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Relative motion between two consecutive left frames.

use crate::core::features::RatioMatcher;
use crate::core::frame::Frame;
use crate::math::epipolar::{self, Correspondence, FundamentalModel};
use crate::math::ransac::RobustFit;
use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Rotation and unit translation direction between two frames.
///
/// Motions map points of the current camera frame into the previous one:
/// `X_prev = rotation * X_curr + translation`.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEstimate {
    /// Rotation, orthonormal with determinant 1.
    pub rotation: Mat3,
    /// Translation direction, unit norm or zero.
    pub translation: Vec3,
    /// False if the estimation is degenerate or failed.
    pub valid: bool,
    /// Number of descriptor matches between both frames.
    pub nb_matches: usize,
    /// Number of inliers of the fundamental matrix.
    pub nb_inliers: usize,
}

impl MotionEstimate {
    /// Identity motion, flagged invalid.
    pub fn none(nb_matches: usize) -> MotionEstimate {
        MotionEstimate {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
            valid: false,
            nb_matches,
            nb_inliers: 0,
        }
    }
}

/// Configuration of the motion estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Ratio test threshold for descriptor matching.
    pub ratio: Float,
    /// Motions whose essential matrix has a middle singular value
    /// below this are flagged invalid.
    pub min_singular_value: Float,
    /// Mean displacement (pixels) of matches below which
    /// the camera is considered static.
    pub min_parallax: Float,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ratio: 0.75,
            min_singular_value: 100.0,
            min_parallax: 0.5,
        }
    }
}

/// Estimates the motion between previous and current left frames
/// from descriptor matches and the epipolar geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionEstimator {
    /// Configuration of the estimator.
    pub config: Config,
}

impl MotionEstimator {
    /// Create an estimator.
    pub fn new(config: Config) -> MotionEstimator {
        MotionEstimator { config }
    }

    /// Motion of the camera from `prev` to `curr`, `k` being the intrinsics.
    ///
    /// Never fails: too few matches or an unsuccessful fit give
    /// an identity motion flagged invalid.
    pub fn estimate<M, R>(&self, matcher: &M, fitter: &R, prev: &Frame, curr: &Frame, k: &Mat3) -> MotionEstimate
    where
        M: RatioMatcher + ?Sized,
        R: RobustFit,
    {
        let matches = matcher.ratio_match(prev.descriptors(), curr.descriptors(), self.config.ratio);
        let nb_matches = matches.len();
        // Current points first, previous second.
        let correspondences: Vec<Correspondence> = matches
            .iter()
            .map(|m| (curr.keypoints()[m.train].position, prev.keypoints()[m.query].position))
            .collect();
        if nb_matches < 8 {
            log::debug!("motion: only {} matches", nb_matches);
            return MotionEstimate::none(nb_matches);
        }
        if mean_displacement(&correspondences) < self.config.min_parallax {
            log::debug!("motion: no parallax");
            return MotionEstimate::none(nb_matches);
        }
        let fit = match fitter.fit(&FundamentalModel, &correspondences) {
            Some(fit) => fit,
            None => {
                log::debug!("motion: no fundamental matrix for {} matches", nb_matches);
                return MotionEstimate::none(nb_matches);
            }
        };
        let e = epipolar::essential_from_fundamental(&fit.model, k);
        let pose = match epipolar::recover_pose(&e, &correspondences, &fit.inliers, k) {
            Some(pose) => pose,
            None => return MotionEstimate::none(nb_matches),
        };
        let degenerate = epipolar::is_degenerate(&e, self.config.min_singular_value);
        if degenerate {
            log::debug!(
                "motion: degenerate essential matrix {:?}",
                epipolar::sorted_singular_values(&e)
            );
        }
        log::debug!(
            "motion: {} matches, {} inliers, {} in front",
            nb_matches,
            fit.nb_inliers,
            pose.nb_in_front
        );
        MotionEstimate {
            rotation: pose.rotation,
            translation: pose.translation,
            valid: !degenerate,
            nb_matches,
            nb_inliers: fit.nb_inliers,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_displacement(correspondences: &[Correspondence]) -> Float {
    if correspondences.is_empty() {
        return 0.0;
    }
    let sum: Float = correspondences.iter().map(|(x1, x2)| (x1 - x2).norm()).sum();
    sum / correspondences.len() as Float
}

// TESTS #############################################################
