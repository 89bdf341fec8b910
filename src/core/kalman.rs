// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Constant velocity Kalman filter of a 3D position.
//!
//! The state is `[position, velocity]`, only the position is observed.

use nalgebra::Matrix3x6;

use crate::misc::type_aliases::{Float, Mat3, Mat6, Vec3, Vec6};

/// Kalman filter with a constant velocity motion model.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter {
    x: Vec6,
    p: Mat6,
    q: Mat6,
    r: Mat3,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        KalmanFilter::new(0.01, 0.001)
    }
}

impl KalmanFilter {
    /// Filter at the origin, with identity covariance,
    /// process noise `q * I6` and measurement noise `r * I3`.
    pub fn new(q: Float, r: Float) -> KalmanFilter {
        KalmanFilter {
            x: Vec6::zeros(),
            p: Mat6::identity(),
            q: q * Mat6::identity(),
            r: r * Mat3::identity(),
        }
    }

    /// Propagate the state `dt` seconds forward.
    pub fn predict(&mut self, dt: Float) {
        let a = transition(dt);
        self.x = a * self.x;
        self.p = a * self.p * a.transpose() + self.q;
    }

    /// Correct the state with a position measurement.
    ///
    /// The innovation covariance is positive definite
    /// as long as the measurement noise is, so the update never fails
    /// for a filter built with positive noises.
    pub fn update(&mut self, z: &Vec3) {
        let h = observation();
        let y = z - h * self.x;
        let s = h * self.p * h.transpose() + self.r;
        let s_inv = match s.cholesky() {
            Some(chol) => chol.inverse(),
            None => {
                log::warn!("kalman: singular innovation covariance, update skipped");
                return;
            }
        };
        let k = self.p * h.transpose() * s_inv;
        self.x += k * y;
        self.p = (Mat6::identity() - k * h) * self.p;
    }

    /// Predict, then update if the measurement is valid.
    /// Returns the filtered position.
    pub fn process(&mut self, dt: Float, z: &Vec3, valid: bool) -> Vec3 {
        self.predict(dt);
        if valid {
            self.update(z);
        }
        self.position()
    }

    /// Estimated position.
    pub fn position(&self) -> Vec3 {
        self.x.fixed_rows::<3>(0).into_owned()
    }

    /// Estimated velocity.
    pub fn velocity(&self) -> Vec3 {
        self.x.fixed_rows::<3>(3).into_owned()
    }

    /// State covariance.
    pub fn covariance(&self) -> &Mat6 {
        &self.p
    }
}

fn transition(dt: Float) -> Mat6 {
    let mut a = Mat6::identity();
    for i in 0..3 {
        a[(i, i + 3)] = dt;
    }
    a
}

fn observation() -> Matrix3x6<Float> {
    Matrix3x6::identity()
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn predict_only_is_stable() {
        let mut kf = KalmanFilter::default();
        let mut trace = kf.covariance().trace();
        for _ in 0..10 {
            kf.predict(1.0);
            assert_eq!(Vec3::zeros(), kf.position());
            let new_trace = kf.covariance().trace();
            assert!(new_trace > trace);
            trace = new_trace;
        }
    }

    #[test]
    fn follows_constant_velocity() {
        let mut kf = KalmanFilter::default();
        let speed = Vec3::new(1.0, 0.0, -2.0);
        let dt = 0.1;
        let mut position = Vec3::zeros();
        for i in 1..=200 {
            position = speed * (Float::from(i) * dt);
            kf.process(dt, &position, true);
        }
        assert_relative_eq!(position, kf.position(), epsilon = 1e-2);
        assert_relative_eq!(speed, kf.velocity(), epsilon = 1e-2);
    }

    #[test]
    fn update_pulls_towards_measurement() {
        let mut kf = KalmanFilter::default();
        kf.predict(0.1);
        let z = Vec3::new(1.0, 1.0, 1.0);
        kf.update(&z);
        let p = kf.position();
        assert!(p.x > 0.9 && p.x < 1.0);
        assert!(kf.covariance().trace() < 6.0);
    }

    #[test]
    fn invalid_steps_only_predict() {
        let mut kf = KalmanFilter::default();
        let filtered = kf.process(0.1, &Vec3::new(5.0, 5.0, 5.0), false);
        assert_eq!(Vec3::zeros(), filtered);
    }
}
