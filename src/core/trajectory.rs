// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration of relative motions into a filtered trajectory.

use crate::core::kalman::KalmanFilter;
use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Conversion factor from units per second to kilo-units per hour.
const TO_KM_PER_HOUR: Float = 3.6;

/// Global pose of the camera with the history of filtered positions
/// and smoothed velocities.
#[derive(Debug, Clone)]
pub struct Trajectory {
    rotation: Mat3,
    translation: Vec3,
    kalman: KalmanFilter,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    window: usize,
}

impl Default for Trajectory {
    fn default() -> Self {
        Trajectory::new(5)
    }
}

impl Trajectory {
    /// Trajectory at the origin, velocities are averaged
    /// over the last `window` values.
    pub fn new(window: usize) -> Trajectory {
        Trajectory {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
            kalman: KalmanFilter::default(),
            positions: vec![Vec3::zeros()],
            velocities: Vec::new(),
            window: window.max(1),
        }
    }

    /// Compose a relative motion `(rotation, translation)` scaled by `scale`
    /// into the global pose, then filter the new position.
    ///
    /// The Kalman filter is corrected only for valid motions.
    /// Returns the filtered position.
    pub fn update(
        &mut self,
        rotation: &Mat3,
        translation: &Vec3,
        dt: Float,
        scale: Float,
        valid: bool,
    ) -> Result<Vec3> {
        check_timestep(dt)?;
        self.translation += scale * (self.rotation * translation);
        self.rotation *= rotation;
        let filtered = self.kalman.process(dt, &self.translation, valid);
        self.record(filtered, dt)?;
        Ok(filtered)
    }

    /// Append a position reached `dt` seconds after the last one,
    /// and its smoothed velocity.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, position: Vec3, dt: Float) -> Result<()> {
        check_timestep(dt)?;
        let last = self.positions.last().cloned().unwrap_or_else(Vec3::zeros);
        self.positions.push(position);
        self.velocities.push(TO_KM_PER_HOUR * (position - last) / dt);
        let start = self.velocities.len().saturating_sub(self.window);
        let window = &self.velocities[start..];
        let mean = window.iter().sum::<Vec3>() / window.len() as Float;
        if let Some(v) = self.velocities.last_mut() {
            *v = mean;
        }
        Ok(())
    }

    /// Filtered positions, starting at the origin.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Smoothed velocities, one per update.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Norms of the smoothed velocities.
    pub fn speeds(&self) -> Vec<Float> {
        self.velocities.iter().map(|v| v.norm()).collect()
    }

    /// Global rotation.
    pub fn rotation(&self) -> &Mat3 {
        &self.rotation
    }

    /// Global translation, before filtering.
    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }
}

fn check_timestep(dt: Float) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidTimestep(dt))
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::so3;
    use approx::assert_relative_eq;

    #[test]
    fn velocity_smoothing_on_constant_motion() {
        let mut traj = Trajectory::new(5);
        let dp = Vec3::new(0.5, 0.0, 1.0);
        for i in 1..=10 {
            traj.record(dp * Float::from(i), 0.1).unwrap();
        }
        let expected = 3.6 * dp / 0.1;
        for v in traj.velocities()[4..].iter() {
            assert_relative_eq!(expected, *v, epsilon = 1e-6);
        }
        assert_eq!(11, traj.positions().len());
    }

    #[test]
    fn velocity_is_averaged() {
        let mut traj = Trajectory::new(2);
        traj.record(Vec3::new(1.0, 0.0, 0.0), 1.0).unwrap();
        traj.record(Vec3::new(4.0, 0.0, 0.0), 1.0).unwrap();
        // Raw velocities 3.6 and 10.8, the second is replaced by their mean.
        assert_relative_eq!(3.6, traj.velocities()[0].x, epsilon = 1e-12);
        assert_relative_eq!(7.2, traj.velocities()[1].x, epsilon = 1e-12);
        let speeds = traj.speeds();
        assert_relative_eq!(7.2, speeds[1], epsilon = 1e-12);
    }

    #[test]
    fn poses_are_composed() {
        let mut traj = Trajectory::default();
        let quarter = so3::exp(Vec3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0));
        let forward = Vec3::new(0.0, 0.0, 1.0);
        traj.update(&quarter, &forward, 0.1, 2.0, true).unwrap();
        assert_relative_eq!(Vec3::new(0.0, 0.0, 2.0), *traj.translation(), epsilon = 1e-12);
        traj.update(&Mat3::identity(), &forward, 0.1, 1.0, true).unwrap();
        // The second step goes along the rotated z axis, which is x.
        assert_relative_eq!(Vec3::new(1.0, 0.0, 2.0), *traj.translation(), epsilon = 1e-12);
        assert_relative_eq!(quarter, *traj.rotation(), epsilon = 1e-12);
    }

    #[test]
    fn invalid_steps_do_not_move_filter() {
        let mut traj = Trajectory::default();
        let p = traj
            .update(&Mat3::identity(), &Vec3::new(0.0, 0.0, 1.0), 0.1, 1.0, false)
            .unwrap();
        assert_eq!(Vec3::zeros(), p);
        assert_eq!(Vec3::new(0.0, 0.0, 1.0), *traj.translation());
    }

    #[test]
    fn rejects_bad_timesteps() {
        let mut traj = Trajectory::default();
        for &dt in [0.0, -0.1, Float::NAN, Float::INFINITY].iter() {
            assert!(traj.update(&Mat3::identity(), &Vec3::zeros(), dt, 1.0, true).is_err());
        }
        assert_eq!(1, traj.positions().len());
    }
}
