// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interoperability conversions between the image and matrix types.

use image::{imageops, GrayImage, Luma};

use crate::misc::type_aliases::GrayMatrix;

/// Convert an `u8` matrix into a `GrayImage`.
/// Inverse operation of `matrix_from_image`.
///
/// Performs a transposition to accomodate for the
/// column major matrix into the row major image.
#[allow(clippy::cast_possible_truncation)]
pub fn image_from_matrix(mat: &GrayMatrix) -> GrayImage {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = GrayImage::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        *pixel = Luma([mat[(y as usize, x as usize)]]);
    }
    img_buf
}

/// Convert a `GrayImage` into an `u8` matrix.
/// Inverse operation of `image_from_matrix`.
pub fn matrix_from_image(img: GrayImage) -> GrayMatrix {
    let (width, height) = img.dimensions();
    GrayMatrix::from_row_slice(height as usize, width as usize, &img.into_raw())
}

/// Resize a gray matrix to `1/factor` of its size with bilinear filtering.
///
/// Sizes are truncated like integer divisions,
/// and never go below one pixel.
#[allow(clippy::cast_possible_truncation)]
pub fn downsample(mat: &GrayMatrix, factor: usize) -> GrayMatrix {
    if factor <= 1 {
        return mat.clone();
    }
    let (nb_rows, nb_cols) = mat.shape();
    let new_width = (nb_cols / factor).max(1) as u32;
    let new_height = (nb_rows / factor).max(1) as u32;
    let resized = imageops::resize(
        &image_from_matrix(mat),
        new_width,
        new_height,
        imageops::FilterType::Triangle,
    );
    matrix_from_image(resized)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_matrix_round_trip() {
        let mat = GrayMatrix::from_fn(3, 5, |i, j| (10 * i + j) as u8);
        let img = image_from_matrix(&mat);
        assert_eq!((5, 3), img.dimensions());
        assert_eq!(Luma([21]), *img.get_pixel(1, 2));
        assert_eq!(mat, matrix_from_image(img));
    }

    #[test]
    fn downsample_divides_dimensions() {
        let mat = GrayMatrix::repeat(48, 64, 120);
        let small = downsample(&mat, 2);
        assert_eq!((24, 32), small.shape());
        assert!(small.iter().all(|&v| v == 120));
        assert_eq!(mat, downsample(&mat, 1));
    }
}
