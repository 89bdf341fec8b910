// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration of a rectified stereo rig.

use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Mat3, Mat34};

/// Intrinsics and rectified projection matrices of a stereo camera,
/// expressed for images downsampled by an integer factor.
///
/// Matrices are rescaled once at construction and never again,
/// so a `Calibration` always describes the images actually processed.
/// It is immutable and usually shared behind an `Arc`.
#[derive(PartialEq, Debug, Clone)]
pub struct Calibration {
    k: Mat3,
    p_left: Mat34,
    p_right: Mat34,
    downsample: usize,
}

impl Calibration {
    /// Build a calibration from full resolution matrices.
    ///
    /// Fails if any coefficient is not finite, if `downsample` is 0,
    /// if `k` is not invertible or if the left 3x3 block
    /// of a projection matrix is singular.
    pub fn new(k: Mat3, p_left: Mat34, p_right: Mat34, downsample: usize) -> Result<Calibration> {
        if downsample == 0 {
            return Err(Error::InvalidCalibration("downsample factor is 0".to_string()));
        }
        let all_finite = k.iter().chain(p_left.iter()).chain(p_right.iter()).all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidCalibration("non finite coefficient".to_string()));
        }
        if k.try_inverse().is_none() {
            return Err(Error::InvalidCalibration("intrinsics are not invertible".to_string()));
        }
        for (name, p) in [("left", &p_left), ("right", &p_right)].iter() {
            if p.fixed_view::<3, 3>(0, 0).into_owned().try_inverse().is_none() {
                return Err(Error::InvalidCalibration(format!(
                    "{} projection matrix is singular",
                    name
                )));
            }
        }
        let s = downsample as Float;
        let mut k = k / s;
        k[(2, 2)] = 1.0;
        Ok(Calibration {
            k,
            p_left: scale_projection(p_left, s),
            p_right: scale_projection(p_right, s),
            downsample,
        })
    }

    /// Intrinsics matrix of the downsampled images.
    pub fn k(&self) -> &Mat3 {
        &self.k
    }

    /// Projection matrix of the left camera for the downsampled images.
    pub fn p_left(&self) -> &Mat34 {
        &self.p_left
    }

    /// Projection matrix of the right camera for the downsampled images.
    pub fn p_right(&self) -> &Mat34 {
        &self.p_right
    }

    /// Downsampling factor between raw images and processed images.
    pub fn downsample(&self) -> usize {
        self.downsample
    }
}

/// Pixel coordinates are divided by `s`, so are the two first rows.
fn scale_projection(mut p: Mat34, s: Float) -> Mat34 {
    for i in 0..2 {
        let row = p.row(i) / s;
        p.set_row(i, &row);
    }
    p
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kitti_like() -> (Mat3, Mat34, Mat34) {
        #[rustfmt::skip]
        let k = Mat3::new(
            718.0, 0.0, 607.0,
            0.0, 718.0, 185.0,
            0.0, 0.0, 1.0,
        );
        let mut p_left = Mat34::zeros();
        p_left.fixed_view_mut::<3, 3>(0, 0).copy_from(&k);
        let mut p_right = p_left;
        p_right[(0, 3)] = -386.0;
        (k, p_left, p_right)
    }

    #[test]
    fn downsample_rescales_once() {
        let (k, p_left, p_right) = kitti_like();
        let calib = Calibration::new(k, p_left, p_right, 2).unwrap();
        assert_relative_eq!(359.0, calib.k()[(0, 0)]);
        assert_relative_eq!(92.5, calib.k()[(1, 2)]);
        assert_relative_eq!(1.0, calib.k()[(2, 2)]);
        assert_relative_eq!(-193.0, calib.p_right()[(0, 3)]);
        assert_relative_eq!(1.0, calib.p_left()[(2, 2)]);
        // Cloning does not rescale again.
        assert_eq!(calib.clone().k(), calib.k());
    }

    #[test]
    fn no_downsample_keeps_matrices() {
        let (k, p_left, p_right) = kitti_like();
        let calib = Calibration::new(k, p_left, p_right, 1).unwrap();
        assert_eq!(&k, calib.k());
        assert_eq!(&p_right, calib.p_right());
    }

    #[test]
    fn invalid_calibrations() {
        let (k, p_left, p_right) = kitti_like();
        assert!(Calibration::new(k, p_left, p_right, 0).is_err());
        assert!(Calibration::new(Mat3::zeros(), p_left, p_right, 1).is_err());
        assert!(Calibration::new(k, Mat34::zeros(), p_right, 1).is_err());
        let mut nan_k = k;
        nan_k[(0, 1)] = Float::NAN;
        assert!(Calibration::new(nan_k, p_left, p_right, 1).is_err());
    }
}
