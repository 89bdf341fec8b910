// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stereo frame pairs: left/right matching and triangulation.

use std::sync::Arc;

use crate::core::camera::Calibration;
use crate::core::features::RatioMatcher;
use crate::core::frame::{Frame, ValidSet};
use crate::error::{Error, Result};
use crate::math::epipolar::{Correspondence, HomographyModel};
use crate::math::ransac::{Fit, RobustFit, RobustModel};
use crate::math::triangulation;
use crate::misc::type_aliases::{Float, Mat3, Mat34, Point2, Point3};

/// Left and right frames of a calibrated stereo rig at one instant.
///
/// After `solve`, the valid subsets of both frames are the stereo matches
/// with a triangulated point closer than the range limit, and
/// `points()` is index aligned with them.
#[derive(Debug, Clone)]
pub struct StereoPair {
    left: Frame,
    right: Frame,
    calibration: Arc<Calibration>,
    points: Vec<Point3>,
}

impl StereoPair {
    /// Pair two frames, not yet matched.
    pub fn new(left: Frame, right: Frame, calibration: Arc<Calibration>) -> StereoPair {
        StereoPair {
            left,
            right,
            calibration,
            points: Vec::new(),
        }
    }

    /// Match left descriptors into right descriptors with the ratio test,
    /// triangulate the matches and drop points at `max_range` or farther.
    ///
    /// Without any match, valid subsets and points are empty.
    pub fn solve<M>(self, matcher: &M, ratio: Float, max_range: Float) -> StereoPair
    where
        M: RatioMatcher + ?Sized,
    {
        let matches = matcher.ratio_match(self.left.descriptors(), self.right.descriptors(), ratio);
        let left_idx: Vec<usize> = matches.iter().map(|m| m.query).collect();
        let right_idx: Vec<usize> = matches.iter().map(|m| m.train).collect();
        let left_valid = ValidSet::select(&self.left, &left_idx);
        let right_valid = ValidSet::select(&self.right, &right_idx);

        let (points, mask) = triangulate_in_range(
            self.calibration.p_left(),
            self.calibration.p_right(),
            left_valid.points(),
            right_valid.points(),
            max_range,
        );
        log::debug!(
            "stereo: {} matches, {} in range",
            matches.len(),
            points.len()
        );
        StereoPair {
            left: self.left.with_valid(left_valid.restrict(&mask)),
            right: self.right.with_valid(right_valid.restrict(&mask)),
            calibration: self.calibration,
            points,
        }
    }

    /// Robust homography mapping valid left points to valid right points.
    pub fn find_homography<R: RobustFit>(&self, fitter: &R) -> Result<Fit<Mat3>> {
        let correspondences: Vec<Correspondence> = self
            .left
            .valid()
            .points()
            .iter()
            .cloned()
            .zip(self.right.valid().points().iter().cloned())
            .collect();
        let needed = HomographyModel.min_sample_size();
        let got = correspondences.len();
        fitter
            .fit(&HomographyModel, &correspondences)
            .ok_or(Error::InsufficientCorrespondence { needed, got })
    }

    /// Left frame.
    pub fn left(&self) -> &Frame {
        &self.left
    }

    /// Right frame.
    pub fn right(&self) -> &Frame {
        &self.right
    }

    /// Calibration shared by all pairs of a sequence.
    pub fn calibration(&self) -> &Arc<Calibration> {
        &self.calibration
    }

    /// Triangulated points in the left camera frame,
    /// index aligned with the valid subsets.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }
}

/// Triangulate correspondences and keep those strictly closer than `max_range`.
///
/// Returns the kept points and the mask over the input correspondences.
pub fn triangulate_in_range(
    p_left: &Mat34,
    p_right: &Mat34,
    left: &[Point2],
    right: &[Point2],
    max_range: Float,
) -> (Vec<Point3>, Vec<bool>) {
    let triangulated = triangulation::triangulate_all(p_left, p_right, left, right);
    let mask = triangulation::range_mask(&triangulated, max_range);
    let points = triangulated
        .into_iter()
        .zip(mask.iter())
        .filter_map(|(p, &keep)| if keep { p } else { None })
        .collect();
    (points, mask)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{BruteForceMatcher, Descriptor, Keypoint};
    use crate::math::ransac::Ransac;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const BASELINE: Float = 0.5;

    fn calibration() -> Arc<Calibration> {
        #[rustfmt::skip]
        let k = Mat3::new(
            500.0, 0.0, 320.0,
            0.0, 500.0, 240.0,
            0.0, 0.0, 1.0,
        );
        let mut p_left = Mat34::zeros();
        p_left.fixed_view_mut::<3, 3>(0, 0).copy_from(&k);
        let mut p_right = p_left;
        p_right[(0, 3)] = -500.0 * BASELINE;
        Arc::new(Calibration::new(k, p_left, p_right, 1).unwrap())
    }

    fn keypoint(position: Point2) -> Keypoint {
        Keypoint {
            position,
            response: 1.0,
            angle: 0.0,
            octave: 0,
        }
    }

    /// Frames observing the given points, with one random descriptor per point.
    fn frames(calib: &Calibration, scene: &[Point3]) -> (Frame, Frame) {
        let mut rng = StdRng::seed_from_u64(42);
        let descriptors: Vec<Descriptor> = scene.iter().map(|_| rng.gen()).collect();
        let project = |p: &Mat34| -> Vec<Keypoint> {
            scene
                .iter()
                .map(|x| keypoint(triangulation::project(p, x).unwrap()))
                .collect()
        };
        let left = Frame::from_parts(None, project(calib.p_left()), descriptors.clone());
        // Reverse the right frame order to check that matching is used.
        let mut right_kps = project(calib.p_right());
        let mut right_descs = descriptors;
        right_kps.reverse();
        right_descs.reverse();
        let right = Frame::from_parts(None, right_kps, right_descs);
        (left, right)
    }

    fn planar_scene() -> Vec<Point3> {
        let mut scene = Vec::new();
        for i in 0..5 {
            for j in 0..4 {
                scene.push(Point3::new(Float::from(i) - 2.0, Float::from(j) - 1.5, 10.0));
            }
        }
        scene
    }

    #[test]
    fn solve_triangulates_and_filters() {
        let calib = calibration();
        let mut scene = planar_scene();
        scene.push(Point3::new(1.0, 0.5, 100.0));
        let (left, right) = frames(&calib, &scene);
        let pair = StereoPair::new(left, right, calib).solve(&BruteForceMatcher, 0.75, 80.0);
        assert_eq!(20, pair.points().len());
        assert_eq!(20, pair.left().valid().len());
        assert_eq!(20, pair.right().valid().len());
        for (p, x) in pair.points().iter().zip(scene.iter()) {
            assert_relative_eq!(p, x, epsilon = 1e-6);
        }
    }

    #[test]
    fn solve_without_matches() {
        let calib = calibration();
        let left = Frame::from_parts(None, Vec::new(), Vec::new());
        let right = Frame::from_parts(None, Vec::new(), Vec::new());
        let pair = StereoPair::new(left, right, calib).solve(&BruteForceMatcher, 0.75, 80.0);
        assert!(pair.points().is_empty());
        assert!(pair.left().valid().is_empty());
        assert!(pair.right().valid().is_empty());
    }

    #[test]
    fn homography_of_fronto_parallel_plane() {
        let calib = calibration();
        let (left, right) = frames(&calib, &planar_scene());
        let pair = StereoPair::new(left, right, calib).solve(&BruteForceMatcher, 0.75, 80.0);
        let fit = pair.find_homography(&Ransac::default()).unwrap();
        assert_eq!(20, fit.nb_inliers);
        // Disparity is f * b / z = 25 pixels.
        let h = fit.model / fit.model[(2, 2)];
        assert_relative_eq!(-25.0, h[(0, 2)], epsilon = 1e-6);
    }

    #[test]
    fn homography_needs_four_points() {
        let calib = calibration();
        let (left, right) = frames(&calib, &planar_scene()[..3]);
        let pair = StereoPair::new(left, right, calib).solve(&BruteForceMatcher, 0.75, 80.0);
        match pair.find_homography(&Ransac::default()) {
            Err(Error::InsufficientCorrespondence { needed, got }) => {
                assert_eq!(4, needed);
                assert_eq!(3, got);
            }
            other => panic!("unexpected result: {:?}", other.map(|f| f.nb_inliers)),
        }
    }
}
