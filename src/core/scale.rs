// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Metric scale of the motion between two stereo pairs.
//!
//! Triangulated points of the previous pair are tracked by optical flow
//! into both current images and triangulated again.
//! The scale is the median horizontal displacement of these points.

use itertools::izip;

use crate::core::optical_flow::LucasKanade;
use crate::core::stereo::{self, StereoPair};
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Point3};

/// Configuration of the scale recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Points triangulated at this distance or farther are discarded.
    pub max_range: Float,
    /// Displacements of `max_speed * dt` or more are discarded (units per second).
    pub max_speed: Float,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_range: 80.0,
            max_speed: 50.0,
        }
    }
}

/// A recovered scale with the number of points supporting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleEstimate {
    /// Median displacement of the tracked points.
    pub scale: Float,
    /// Number of displacements used for the median.
    pub nb_points: usize,
}

/// Scale recovery from tracked stereo points.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleRecovery {
    /// Configuration of the recovery.
    pub config: Config,
    /// Optical flow tracker.
    pub flow: LucasKanade,
}

impl ScaleRecovery {
    /// Create a scale recovery.
    pub fn new(config: Config, flow: LucasKanade) -> ScaleRecovery {
        ScaleRecovery { config, flow }
    }

    /// Scale of the motion between a solved previous pair and a current pair,
    /// `dt` seconds later.
    ///
    /// Only the images and calibration of the current pair are used.
    /// Returns `None` when no displacement survives the filters,
    /// or when an image is missing.
    pub fn estimate(&self, prev: &StereoPair, curr: &StereoPair, dt: Float) -> Option<ScaleEstimate> {
        let prev_points = prev.points();
        if prev_points.is_empty() {
            return None;
        }
        let left_tracked = self.flow.track(
            prev.left().image()?,
            curr.left().image()?,
            prev.left().valid().points(),
        );
        let right_tracked = self.flow.track(
            prev.right().image()?,
            curr.right().image()?,
            prev.right().valid().points(),
        );

        // Keep points tracked on both sides.
        let mut curr_left = Vec::new();
        let mut curr_right = Vec::new();
        let mut prev_kept = Vec::new();
        for (l, r, p) in izip!(&left_tracked, &right_tracked, prev_points) {
            if let (Some(l), Some(r)) = (l, r) {
                curr_left.push(*l);
                curr_right.push(*r);
                prev_kept.push(*p);
            }
        }

        let calibration = curr.calibration();
        let (curr_points, mask) = stereo::triangulate_in_range(
            calibration.p_left(),
            calibration.p_right(),
            &curr_left,
            &curr_right,
            self.config.max_range,
        );
        let prev_kept = helper::keep_where(&prev_kept, &mask);

        let max_displacement = self.config.max_speed * dt;
        let displacements: Vec<Float> = prev_kept
            .iter()
            .zip(curr_points.iter())
            .map(|(p, c)| planar_displacement(p, c))
            .filter(|&d| d < max_displacement)
            .collect();
        log::debug!(
            "scale: {} tracked, {} triangulated, {} kept",
            curr_left.len(),
            curr_points.len(),
            displacements.len()
        );
        let scale = helper::median(&displacements)?;
        Some(ScaleEstimate {
            scale,
            nb_points: displacements.len(),
        })
    }
}

/// Displacement in the horizontal plane (x, z), y being the vertical axis.
pub fn planar_displacement(a: &Point3, b: &Point3) -> Float {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

// TESTS #############################################################
