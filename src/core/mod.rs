// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Core functionalities of Stereo Odometry Rust.

pub mod camera;
pub mod features;
pub mod frame;
pub mod gradient;
pub mod kalman;
pub mod motion;
pub mod multires;
pub mod odometry;
pub mod optical_flow;
pub mod scale;
pub mod stereo;
pub mod trajectory;
