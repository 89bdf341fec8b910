// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stereo visual odometry pipeline.
//!
//! At each new stereo pair, the scale is recovered by tracking the points
//! triangulated in the previous pair, the motion direction is estimated
//! between previous and current left images, and both are integrated
//! into a Kalman filtered trajectory.
//! The current pair is then matched and triangulated to become the previous one.

use rayon::prelude::*;
use std::sync::Arc;

use crate::core::camera::Calibration;
use crate::core::features::{BruteForceMatcher, DetectAndDescribe, Orb, OrbConfig, RatioMatcher};
use crate::core::frame::Frame;
use crate::core::motion::{self, MotionEstimate, MotionEstimator};
use crate::core::optical_flow::{self, LucasKanade};
use crate::core::scale::{self, ScaleEstimate, ScaleRecovery};
use crate::core::stereo::StereoPair;
use crate::core::trajectory::Trajectory;
use crate::error::{Error, Result};
use crate::math::ransac::{self, Ransac, RobustFit};
use crate::misc::type_aliases::{Float, GrayMatrix, Vec3};

/// Struct used for tracking the camera at each stereo pair.
/// Can only be constructed by initialization from a `Config`.
pub struct Tracker<D = Orb, M = BruteForceMatcher, R = Ransac> {
    config: Config,
    detector: D,
    matcher: M,
    fitter: R,
    motion: MotionEstimator,
    scale: ScaleRecovery,
    calibration: Arc<Calibration>,
    state: State,
}

/// Configuration of the Tracker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Images are downsampled by this integer factor before processing.
    pub downsample: usize,
    /// Ratio test threshold of stereo matching.
    pub stereo_ratio: Float,
    /// Triangulated points at this distance or farther are discarded.
    pub max_range: Float,
    /// Number of velocities averaged by the trajectory.
    pub velocity_window: usize,
    /// Keypoints detector.
    pub orb: OrbConfig,
    /// Motion estimation.
    pub motion: motion::Config,
    /// Scale recovery.
    pub scale: scale::Config,
    /// Optical flow of the scale recovery.
    pub optical_flow: optical_flow::Config,
    /// Robust fitting of epipolar geometry.
    pub ransac: ransac::Config,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            downsample: 1,
            stereo_ratio: 0.75,
            max_range: 80.0,
            velocity_window: 5,
            orb: OrbConfig::default(),
            motion: motion::Config::default(),
            scale: scale::Config::default(),
            optical_flow: optical_flow::Config::default(),
            ransac: ransac::Config::default(),
        }
    }
}

/// Internal state of the tracker.
struct State {
    previous: StereoPair,
    timestamp: f64,
    last_scale: Float,
    trajectory: Trajectory,
}

/// What happened during one tracking step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Timestamp of the tracked pair.
    pub timestamp: f64,
    /// Time since the previous pair.
    pub dt: Float,
    /// Estimated relative motion.
    pub motion: MotionEstimate,
    /// Recovered scale, `None` if it could not be recovered this step.
    pub scale_estimate: Option<ScaleEstimate>,
    /// Scale actually applied to the motion.
    pub scale: Float,
    /// True if the Kalman filter was corrected.
    pub valid: bool,
    /// Filtered position after this step.
    pub position: Vec3,
}

impl Config {
    /// Initialize a tracker with the first stereo pair,
    /// using the ORB-like detector, brute force matching and RANSAC.
    pub fn init(
        self,
        calibration: Calibration,
        timestamp: f64,
        left: GrayMatrix,
        right: GrayMatrix,
    ) -> Result<Tracker> {
        let detector = Orb::new(self.orb);
        let left = Frame::new(Some(left), &detector, self.downsample);
        let right = Frame::new(Some(right), &detector, self.downsample);
        let fitter = Ransac::new(self.ransac.clone());
        self.init_with(detector, BruteForceMatcher, fitter, calibration, timestamp, left, right)
    }

    /// Same as `init` but with frames already detected.
    pub fn init_frames(self, calibration: Calibration, timestamp: f64, left: Frame, right: Frame) -> Result<Tracker> {
        let detector = Orb::new(self.orb);
        let fitter = Ransac::new(self.ransac.clone());
        self.init_with(detector, BruteForceMatcher, fitter, calibration, timestamp, left, right)
    }

    /// Initialize a tracker with custom detector, matcher and robust fitter,
    /// from the frames of the first stereo pair.
    #[allow(clippy::too_many_arguments)]
    pub fn init_with<D, M, R>(
        self,
        detector: D,
        matcher: M,
        fitter: R,
        calibration: Calibration,
        timestamp: f64,
        left: Frame,
        right: Frame,
    ) -> Result<Tracker<D, M, R>>
    where
        D: DetectAndDescribe,
        M: RatioMatcher,
        R: RobustFit,
    {
        if !timestamp.is_finite() {
            return Err(Error::InvalidTimestep(timestamp));
        }
        if calibration.downsample() != self.downsample {
            return Err(Error::InvalidCalibration(format!(
                "calibration downsample {} differs from configuration {}",
                calibration.downsample(),
                self.downsample
            )));
        }
        let calibration = Arc::new(calibration);
        let previous = StereoPair::new(left, right, calibration.clone()).solve(
            &matcher,
            self.stereo_ratio,
            self.max_range,
        );
        log::info!(
            "initial pair: {} triangulated points",
            previous.points().len()
        );
        let state = State {
            previous,
            timestamp,
            last_scale: 0.0,
            trajectory: Trajectory::new(self.velocity_window),
        };
        Ok(Tracker {
            motion: MotionEstimator::new(self.motion),
            scale: ScaleRecovery::new(self.scale, LucasKanade::new(self.optical_flow)),
            config: self,
            detector,
            matcher,
            fitter,
            calibration,
            state,
        })
    }
} // impl Config

impl<D, M, R> Tracker<D, M, R>
where
    D: DetectAndDescribe,
    M: RatioMatcher,
    R: RobustFit,
{
    /// Track a new stereo pair.
    /// Internally mutates the tracker state.
    pub fn track(&mut self, timestamp: f64, left: GrayMatrix, right: GrayMatrix) -> Result<StepReport> {
        let left = Frame::new(Some(left), &self.detector, self.config.downsample);
        let right = Frame::new(Some(right), &self.detector, self.config.downsample);
        self.track_frames(timestamp, left, right)
    }

    /// Track a stereo pair whose frames are already detected,
    /// for example with `detect_frames`.
    pub fn track_frames(&mut self, timestamp: f64, left: Frame, right: Frame) -> Result<StepReport> {
        let dt = timestamp - self.state.timestamp;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::InvalidTimestep(dt));
        }
        let current = StereoPair::new(left, right, self.calibration.clone());

        let scale_estimate = self.scale.estimate(&self.state.previous, &current, dt);
        let motion = self.motion.estimate(
            &self.matcher,
            &self.fitter,
            self.state.previous.left(),
            current.left(),
            self.calibration.k(),
        );

        let scale = match scale_estimate {
            Some(estimate) => {
                self.state.last_scale = estimate.scale;
                estimate.scale
            }
            None => {
                log::warn!(
                    "no scale at {}, reusing {}",
                    timestamp,
                    self.state.last_scale
                );
                self.state.last_scale
            }
        };
        let valid = motion.valid && scale_estimate.is_some();
        let position = self.state.trajectory.update(
            &motion.rotation,
            &motion.translation,
            dt,
            scale,
            valid,
        )?;
        log::debug!(
            "step {}: scale {}, valid {}, position {:?}",
            timestamp,
            scale,
            valid,
            position.as_slice()
        );

        self.state.previous = current.solve(&self.matcher, self.config.stereo_ratio, self.config.max_range);
        self.state.timestamp = timestamp;
        Ok(StepReport {
            timestamp,
            dt,
            motion,
            scale_estimate,
            scale,
            valid,
            position,
        })
    }

    /// Integrated trajectory so far.
    pub fn trajectory(&self) -> &Trajectory {
        &self.state.trajectory
    }

    /// Last tracked stereo pair, matched and triangulated.
    pub fn previous(&self) -> &StereoPair {
        &self.state.previous
    }

    /// Timestamp of the last tracked pair.
    pub fn timestamp(&self) -> f64 {
        self.state.timestamp
    }

    /// Last successfully recovered scale, 0 before any.
    pub fn last_scale(&self) -> Float {
        self.state.last_scale
    }

    /// Detector used for new frames.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Configuration of the tracker.
    pub fn config(&self) -> &Config {
        &self.config
    }
} // impl Tracker

/// Detect the frames of many stereo pairs in parallel.
/// Output order is the input order.
pub fn detect_frames<D>(
    detector: &D,
    downsample: usize,
    pairs: Vec<(GrayMatrix, GrayMatrix)>,
) -> Vec<(Frame, Frame)>
where
    D: DetectAndDescribe + Sync,
{
    pairs
        .into_par_iter()
        .map(|(left, right)| {
            (
                Frame::new(Some(left), detector, downsample),
                Frame::new(Some(right), detector, downsample),
            )
        })
        .collect()
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{Descriptor, Keypoint};
    use crate::math::so3;
    use crate::misc::type_aliases::{Mat3, Mat34, Point2, Point3};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const FOCAL: Float = 500.0;
    const BASELINE: Float = 0.5;

    fn calibration() -> Calibration {
        let k = Mat3::new(FOCAL, 0.0, 120.0, 0.0, FOCAL, 90.0, 0.0, 0.0, 1.0);
        let mut p_left = Mat34::zeros();
        p_left.fixed_view_mut::<3, 3>(0, 0).copy_from(&k);
        let mut p_right = p_left;
        p_right[(0, 3)] = -FOCAL * BASELINE;
        Calibration::new(k, p_left, p_right, 1).unwrap()
    }

    fn image() -> GrayMatrix {
        GrayMatrix::from_fn(120, 160, |y, x| ((x * 7 + y * 13) % 97 + (x / 16 + y / 16) % 2 * 120) as u8)
    }

    #[test]
    fn rejects_non_increasing_timestamps() {
        let mut tracker = Config::default().init(calibration(), 1.0, image(), image()).unwrap();
        assert!(tracker.track(1.0, image(), image()).is_err());
        assert!(tracker.track(0.5, image(), image()).is_err());
        assert_eq!(1, tracker.trajectory().positions().len());
    }

    #[test]
    fn rejects_mismatched_downsample() {
        let config = Config {
            downsample: 2,
            ..Config::default()
        };
        assert!(config.init(calibration(), 0.0, image(), image()).is_err());
    }

    #[test]
    fn parallel_detection_keeps_order() {
        let orb = Orb::default();
        let dark = GrayMatrix::repeat(120, 160, 0);
        let frames = detect_frames(&orb, 1, vec![(image(), dark.clone()), (dark, image())]);
        assert_eq!(2, frames.len());
        assert!(frames[0].1.keypoints().is_empty());
        assert!(frames[1].0.keypoints().is_empty());
        assert_eq!(frames[0].0.keypoints(), frames[1].1.keypoints());
    }

    // Moving camera ###############################################

    fn texture(u: Float, v: Float) -> Float {
        128.0 + 50.0 * (0.2 * u).sin() * (0.17 * v).cos() + 40.0 * (0.08 * (u + v)).sin()
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn textured(shift: Float) -> GrayMatrix {
        GrayMatrix::from_fn(180, 240, |y, x| texture(x as Float + shift, y as Float).round() as u8)
    }

    fn keypoint(position: Point2) -> Keypoint {
        Keypoint {
            position,
            response: 1.0,
            angle: 0.0,
            octave: 0,
        }
    }

    /// Points at various depths in front of the first left camera.
    fn scene() -> Vec<Point3> {
        let k = *calibration().k();
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..4 {
                let x = Float::from(60 + 20 * i);
                let y = Float::from(50 + 20 * j);
                let z = 8.0 + Float::from((i * 7 + j * 3) % 5) * 1.5;
                points.push(Point3::new((x - k[(0, 2)]) * z / FOCAL, (y - k[(1, 2)]) * z / FOCAL, z));
            }
        }
        points
    }

    /// Camera motion of one step: `X_curr = R_c X_prev + t_c`.
    fn move_camera(points: &[Point3]) -> Vec<Point3> {
        let r_c = so3::exp(Vec3::new(0.0, 0.002, 0.0));
        let t_c = Vec3::new(-0.3, 0.0, -0.2);
        points.iter().map(|p| Point3::from(r_c * p.coords + t_c)).collect()
    }

    /// Stereo frames observing `points`, descriptors shared by both sides.
    /// Images are the textured plane shifted by `shift` on the left.
    fn frames(points: &[Point3], descriptors: &[Descriptor], shift: Option<Float>) -> (Frame, Frame) {
        let k = *calibration().k();
        let disparity = FOCAL * BASELINE / 10.0;
        let mut left_kps = Vec::new();
        let mut right_kps = Vec::new();
        for p in points {
            let uvw = k * p.coords;
            let left = Point2::new(uvw.x / uvw.z, uvw.y / uvw.z);
            left_kps.push(keypoint(left));
            right_kps.push(keypoint(Point2::new(left.x - FOCAL * BASELINE / p.z, left.y)));
        }
        let left_img = shift.map(textured);
        let right_img = shift.map(|s| textured(s + disparity));
        (
            Frame::from_parts(left_img, left_kps, descriptors.to_vec()),
            Frame::from_parts(right_img, right_kps, descriptors.to_vec()),
        )
    }

    #[test]
    fn moving_camera_with_scale_fallback() {
        let mut rng = StdRng::seed_from_u64(5);
        let first = scene();
        let descriptors: Vec<Descriptor> = first.iter().map(|_| rng.gen()).collect();
        let (left, right) = frames(&first, &descriptors, Some(0.0));
        let mut tracker = Config::default().init_frames(calibration(), 0.0, left, right).unwrap();
        assert_eq!(24, tracker.previous().points().len());

        // Textured plane at depth 10 seen 0.3 to the right.
        let second = move_camera(&first);
        let (left, right) = frames(&second, &descriptors, Some(15.0));
        let report = tracker.track_frames(0.1, left, right).unwrap();
        assert!(report.motion.valid);
        assert!(report.valid);
        let estimate = report.scale_estimate.expect("scale should be recovered");
        assert!(report.scale > 0.2 && report.scale < 0.5, "scale {}", report.scale);
        assert_relative_eq!(estimate.scale, report.scale);
        assert_relative_eq!(report.scale, tracker.last_scale());
        assert!(report.position.norm() > 0.1, "position {}", report.position);

        // Without images the scale is lost: previous scale, prediction only.
        let mut predicted = tracker.trajectory().clone();
        let third = move_camera(&second);
        let (left, right) = frames(&third, &descriptors, None);
        let fallback = tracker.track_frames(0.2, left, right).unwrap();
        assert!(fallback.scale_estimate.is_none());
        assert!(!fallback.valid);
        assert_relative_eq!(report.scale, fallback.scale);
        assert_relative_eq!(report.scale, tracker.last_scale());
        let expected = predicted
            .update(&fallback.motion.rotation, &fallback.motion.translation, 0.1, report.scale, false)
            .unwrap();
        assert_eq!(expected, fallback.position);
        assert_eq!(3, tracker.trajectory().positions().len());
    }
}
