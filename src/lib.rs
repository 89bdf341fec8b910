// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stereo visual odometry in Rust.
//!
//! The core of the library is the `core::odometry` tracker,
//! estimating the trajectory of a calibrated stereo rig from
//! a sequence of rectified image pairs.

#![warn(missing_docs)]

pub mod core;
pub mod dataset;
pub mod error;
pub mod math;
pub mod misc;
