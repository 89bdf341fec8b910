// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frames: one image with its detected keypoints and descriptors.

use crate::core::features::{DetectAndDescribe, Descriptor, Keypoint};
use crate::core::multires;
use crate::misc::{helper, interop, type_aliases::GrayMatrix, type_aliases::Point2};

/// An image with its keypoints and descriptors.
///
/// The `valid` subset holds the keypoints kept after stereo matching.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Option<GrayMatrix>,
    shape: (usize, usize),
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
    valid: ValidSet,
}

/// Index aligned subset of the keypoints of a frame.
///
/// The three containers always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidSet {
    points: Vec<Point2>,
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl ValidSet {
    /// Select the keypoints and descriptors of a frame at the given indices.
    ///
    /// Panics if an index is out of bounds.
    pub fn select(frame: &Frame, indices: &[usize]) -> ValidSet {
        let keypoints: Vec<Keypoint> = indices.iter().map(|&i| frame.keypoints[i]).collect();
        ValidSet {
            points: keypoints.iter().map(|kp| kp.position).collect(),
            descriptors: indices.iter().map(|&i| frame.descriptors[i]).collect(),
            keypoints,
        }
    }

    /// Keep only the elements where the mask is true.
    pub fn restrict(&self, mask: &[bool]) -> ValidSet {
        ValidSet {
            points: helper::keep_where(&self.points, mask),
            keypoints: helper::keep_where(&self.keypoints, mask),
            descriptors: helper::keep_where(&self.descriptors, mask),
        }
    }

    /// Pixel coordinates of the valid keypoints.
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Valid keypoints.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Descriptors of the valid keypoints.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Number of valid keypoints.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there is no valid keypoint.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Frame {
    /// Resize an image by `1 / downsample` and detect its keypoints.
    ///
    /// Without image, the frame has no keypoint.
    pub fn new<D>(image: Option<GrayMatrix>, detector: &D, downsample: usize) -> Frame
    where
        D: DetectAndDescribe + ?Sized,
    {
        let image = image.map(|img| resize(img, downsample));
        let shape = image.as_ref().map_or((0, 0), |img| img.shape());
        let (keypoints, descriptors) = match &image {
            Some(img) => detector.detect_and_describe(img),
            None => (Vec::new(), Vec::new()),
        };
        Frame {
            image,
            shape,
            keypoints,
            descriptors,
            valid: ValidSet::default(),
        }
    }

    /// Frame from already computed keypoints and descriptors.
    ///
    /// Panics if keypoints and descriptors are not index aligned.
    pub fn from_parts(
        image: Option<GrayMatrix>,
        keypoints: Vec<Keypoint>,
        descriptors: Vec<Descriptor>,
    ) -> Frame {
        assert_eq!(keypoints.len(), descriptors.len(), "Unpaired descriptors");
        let shape = image.as_ref().map_or((0, 0), |img| img.shape());
        Frame {
            image,
            shape,
            keypoints,
            descriptors,
            valid: ValidSet::default(),
        }
    }

    /// Same frame with a new valid subset.
    pub fn with_valid(self, valid: ValidSet) -> Frame {
        Frame { valid, ..self }
    }

    /// The resized image, if any.
    pub fn image(&self) -> Option<&GrayMatrix> {
        self.image.as_ref()
    }

    /// Shape `(rows, columns)` of the resized image.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// All detected keypoints, strongest first.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Descriptors, index aligned with `keypoints()`.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// The valid subset.
    pub fn valid(&self) -> &ValidSet {
        &self.valid
    }
}

/// Divide the size of an image by an integer factor.
///
/// Powers of two use the 2x2 bloc mean of the image pyramid,
/// other factors and images too small for the pyramid a bilinear resampling.
/// The result is `size / factor`, at least 1.
pub fn resize(img: GrayMatrix, factor: usize) -> GrayMatrix {
    let (nb_rows, nb_cols) = img.shape();
    if factor <= 1 {
        img
    } else if factor.is_power_of_two() && nb_rows >= factor && nb_cols >= factor {
        let nb_levels = factor.trailing_zeros() as usize + 1;
        let mut pyramid = multires::mean_pyramid(nb_levels, img);
        let coarsest = pyramid.len() - 1;
        pyramid.swap_remove(coarsest)
    } else {
        interop::downsample(&img, factor)
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::Orb;

    fn blobs() -> GrayMatrix {
        GrayMatrix::from_fn(120, 160, |y, x| {
            if (x >= 40 && x < 60 && y >= 40 && y < 55) || (x >= 90 && x < 110 && y >= 60 && y < 80) {
                220
            } else {
                30
            }
        })
    }

    #[test]
    fn frame_without_image() {
        let frame = Frame::new(None, &Orb::default(), 1);
        assert!(frame.image().is_none());
        assert_eq!((0, 0), frame.shape());
        assert!(frame.keypoints().is_empty());
        assert!(frame.valid().is_empty());
    }

    #[test]
    fn frame_is_resized() {
        let frame = Frame::new(Some(blobs()), &Orb::default(), 2);
        assert_eq!((60, 80), frame.shape());
        let frame = Frame::new(Some(blobs()), &Orb::default(), 3);
        assert_eq!((40, 53), frame.shape());
    }

    #[test]
    fn valid_subset_stays_aligned() {
        let frame = Frame::new(Some(blobs()), &Orb::default(), 1);
        assert!(frame.keypoints().len() >= 3);
        let valid = ValidSet::select(&frame, &[2, 0, 1]);
        assert_eq!(3, valid.len());
        assert_eq!(frame.keypoints()[2].position, valid.points()[0]);
        assert_eq!(frame.descriptors()[0], valid.descriptors()[1]);
        let restricted = valid.restrict(&[false, true, true]);
        assert_eq!(2, restricted.len());
        assert_eq!(restricted.keypoints().len(), restricted.descriptors().len());
        assert_eq!(frame.keypoints()[0], restricted.keypoints()[0]);
        let frame = frame.with_valid(restricted.clone());
        assert_eq!(&restricted, frame.valid());
    }

    #[test]
    fn resize_by_power_of_two() {
        let img = GrayMatrix::repeat(64, 48, 9);
        let resized = resize(img, 4);
        assert_eq!((16, 12), resized.shape());
        assert!(resized.iter().all(|&v| v == 9));
    }

    #[test]
    fn resize_thin_image_by_exact_factor() {
        let img = GrayMatrix::repeat(3, 100, 7);
        assert_eq!((1, 25), resize(img, 4).shape());
    }
}
