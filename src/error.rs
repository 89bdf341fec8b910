// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type shared by the whole library.
//!
//! Only conditions that must abort a trajectory run are reported as errors.
//! Per-frame estimation failures (too few matches, degenerate motion,
//! unknown scale) are carried as values so that the tracker can degrade
//! to a prediction only step.

use thiserror::Error;

/// Errors of the stereo odometry library.
#[derive(Error, Debug)]
pub enum Error {
    /// Calibration matrices are malformed or not invertible.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    /// No image could be provided for the given frame index.
    #[error("missing image for frame {0}")]
    MissingImage(usize),
    /// Time between two frames must be positive and finite.
    #[error("invalid time step: {0}")]
    InvalidTimestep(f64),
    /// Not enough point correspondences for an estimation.
    #[error("insufficient correspondences: needed {needed}, got {got}")]
    InsufficientCorrespondence {
        /// Minimum number of correspondences.
        needed: usize,
        /// Number of correspondences available.
        got: usize,
    },
    /// Dataset files could not be interpreted.
    #[error("dataset error: {0}")]
    Dataset(String),
    /// Image decoding failure.
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type of the library.
pub type Result<T> = std::result::Result<T, Error>;
