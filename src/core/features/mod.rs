// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Keypoint detection, binary descriptors and descriptor matching.
//!
//! The rest of the library only relies on the two capability traits
//! `DetectAndDescribe` and `RatioMatcher`, so that other detectors
//! or matchers can be substituted to the provided ORB-like detector
//! and brute force Hamming matcher.

pub mod brief;
pub mod fast;
pub mod matcher;
pub mod orb;

pub use self::matcher::BruteForceMatcher;
pub use self::orb::{Orb, OrbConfig};

use crate::misc::type_aliases::{Float, GrayMatrix, Point2};

/// Number of bytes of a binary descriptor (256 bits).
pub const DESCRIPTOR_BYTES: usize = 32;

/// A binary descriptor.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// A detected keypoint, in pixel coordinates of the full resolution image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Sub-pixel position `(x, y)` where x is the column.
    pub position: Point2,
    /// Detector response, higher is stronger.
    pub response: Float,
    /// Orientation (radians) of the keypoint patch.
    pub angle: Float,
    /// Pyramid level where the keypoint was detected.
    pub octave: usize,
}

/// A match between the descriptor at index `query` of a first set
/// and the descriptor at index `train` of a second set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index in the query set.
    pub query: usize,
    /// Index in the train set.
    pub train: usize,
    /// Hamming distance between both descriptors.
    pub distance: u32,
}

/// Capability of detecting keypoints and computing their descriptors.
///
/// The two returned vectors are index aligned.
pub trait DetectAndDescribe {
    /// Detect and describe keypoints of a gray image.
    fn detect_and_describe(&self, img: &GrayMatrix) -> (Vec<Keypoint>, Vec<Descriptor>);
}

/// Capability of matching two sets of descriptors with the ratio test
/// on the two nearest neighbors.
pub trait RatioMatcher {
    /// Matches of `query` descriptors into `train` descriptors.
    /// A match is kept only if its distance is smaller than
    /// `ratio` times the distance of the second best candidate.
    fn ratio_match(&self, query: &[Descriptor], train: &[Descriptor], ratio: Float) -> Vec<Match>;
}

/// Number of different bits between two descriptors.
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

// TESTS #############################################################
