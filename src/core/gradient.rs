// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to compute image gradients.

use nalgebra::DMatrix;

use crate::misc::type_aliases::{Float, GrayMatrix};

/// Centered gradients `(gx, gy)` of an image.
///
/// Interior pixels use `(next - previous) / 2`,
/// border pixels use the one-sided difference.
pub fn centered(img: &GrayMatrix) -> (DMatrix<Float>, DMatrix<Float>) {
    let (nrows, ncols) = img.shape();
    let at = |y: usize, x: usize| Float::from(img[(y, x)]);
    let gx = DMatrix::from_fn(nrows, ncols, |y, x| {
        if ncols < 2 {
            0.0
        } else if x == 0 {
            at(y, 1) - at(y, 0)
        } else if x == ncols - 1 {
            at(y, x) - at(y, x - 1)
        } else {
            0.5 * (at(y, x + 1) - at(y, x - 1))
        }
    });
    let gy = DMatrix::from_fn(nrows, ncols, |y, x| {
        if nrows < 2 {
            0.0
        } else if y == 0 {
            at(1, x) - at(0, x)
        } else if y == nrows - 1 {
            at(y, x) - at(y - 1, x)
        } else {
            0.5 * (at(y + 1, x) - at(y - 1, x))
        }
    });
    (gx, gy)
}

/// Bilinear interpolation of a matrix at floating point coordinates `(x, y)`,
/// where x is the column.
/// Return `None` if the 2x2 neighborhood is not fully inside the matrix.
#[allow(clippy::many_single_char_names)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn interpolate<T>(x: Float, y: Float, mat: &DMatrix<T>) -> Option<Float>
where
    T: nalgebra::Scalar + Copy + Into<Float>,
{
    let (height, width) = mat.shape();
    let u = x.floor();
    let v = y.floor();
    if u >= 0.0 && v >= 0.0 && u + 1.0 < width as Float && v + 1.0 < height as Float {
        let u_0 = u as usize;
        let v_0 = v as usize;
        let u_1 = u_0 + 1;
        let v_1 = v_0 + 1;
        let vu_00: Float = mat[(v_0, u_0)].into();
        let vu_10: Float = mat[(v_1, u_0)].into();
        let vu_01: Float = mat[(v_0, u_1)].into();
        let vu_11: Float = mat[(v_1, u_1)].into();
        let a = x - u;
        let b = y - v;
        Some(
            (1.0 - b) * (1.0 - a) * vu_00
                + b * (1.0 - a) * vu_10
                + (1.0 - b) * a * vu_01
                + b * a * vu_11,
        )
    } else {
        None
    }
}

/// Bilinear interpolation with coordinates clamped inside the matrix,
/// which replicates its border. The matrix must not be empty.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn interpolate_clamped<T>(x: Float, y: Float, mat: &DMatrix<T>) -> Float
where
    T: nalgebra::Scalar + Copy + Into<Float>,
{
    let (height, width) = mat.shape();
    let x = x.max(0.0).min((width - 1) as Float);
    let y = y.max(0.0).min((height - 1) as Float);
    let u_0 = (x.floor() as usize).min(width.saturating_sub(2));
    let v_0 = (y.floor() as usize).min(height.saturating_sub(2));
    let u_1 = (u_0 + 1).min(width - 1);
    let v_1 = (v_0 + 1).min(height - 1);
    let a = x - u_0 as Float;
    let b = y - v_0 as Float;
    let vu_00: Float = mat[(v_0, u_0)].into();
    let vu_10: Float = mat[(v_1, u_0)].into();
    let vu_01: Float = mat[(v_0, u_1)].into();
    let vu_11: Float = mat[(v_1, u_1)].into();
    (1.0 - b) * (1.0 - a) * vu_00 + b * (1.0 - a) * vu_10 + (1.0 - b) * a * vu_01 + b * a * vu_11
}

// TESTS #############################################################
