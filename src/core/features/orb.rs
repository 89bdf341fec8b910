// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-scale oriented FAST keypoints with steered BRIEF descriptors.

use super::brief::{self, Integral, Pattern};
use super::fast;
use super::{DetectAndDescribe, Descriptor, Keypoint};
use crate::core::multires;
use crate::misc::type_aliases::{Float, GrayMatrix, Point2};

/// Configuration of the ORB-like detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbConfig {
    /// Maximum number of keypoints kept, strongest first.
    pub n_features: usize,
    /// Intensity threshold of the FAST test.
    pub fast_threshold: u8,
    /// Number of pyramid levels, including the full resolution.
    pub n_levels: usize,
    /// Seed of the sampling pattern.
    pub seed: u64,
}

impl Default for OrbConfig {
    fn default() -> Self {
        OrbConfig {
            n_features: 800,
            fast_threshold: 20,
            n_levels: 3,
            seed: 0,
        }
    }
}

/// Detector and descriptor extractor.
#[derive(Debug, Clone)]
pub struct Orb {
    /// Configuration used to create this detector.
    pub config: OrbConfig,
    pattern: Pattern,
}

impl Orb {
    /// Create a detector, generating its sampling pattern.
    pub fn new(config: OrbConfig) -> Orb {
        Orb {
            config,
            pattern: Pattern::new(config.seed),
        }
    }
}

impl Default for Orb {
    fn default() -> Self {
        Orb::new(OrbConfig::default())
    }
}

impl DetectAndDescribe for Orb {
    #[allow(clippy::cast_precision_loss)]
    fn detect_and_describe(&self, img: &GrayMatrix) -> (Vec<Keypoint>, Vec<Descriptor>) {
        let pyramid = multires::mean_pyramid(self.config.n_levels.max(1), img.clone());
        let mut described = Vec::new();
        for (octave, level_img) in pyramid.iter().enumerate() {
            let corners = fast::detect(level_img, self.config.fast_threshold, brief::EDGE);
            if corners.is_empty() {
                continue;
            }
            let integral = Integral::new(level_img);
            for c in corners {
                let angle = brief::orientation(level_img, c.x, c.y);
                let descriptor = self.pattern.describe(&integral, c.x, c.y, angle);
                let position = Point2::new(
                    multires::from_level(c.x as Float, octave),
                    multires::from_level(c.y as Float, octave),
                );
                let keypoint = Keypoint {
                    position,
                    response: Float::from(c.score),
                    angle,
                    octave,
                };
                described.push((keypoint, descriptor));
            }
        }
        // Stable sort keeps the scan order among equal responses.
        described.sort_by(|(a, _), (b, _)| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        described.truncate(self.config.n_features);
        described.into_iter().unzip()
    }
}

// TESTS #############################################################
