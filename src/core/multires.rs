// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-resolution image pyramids.
//!
//! Each level is half the resolution of the previous one.
//! A pixel `(i, j)` at one level is the 2x2 bloc `(2i..2i+1, 2j..2j+1)`
//! of the level below, so pixel centers move by `x' = (x + 0.5) / 2 - 0.5`.

use nalgebra::{DMatrix, Scalar};

use crate::misc::type_aliases::{Float, GrayMatrix};

/// Recursively generate a pyramid of at most `nb_levels` matrices where each level
/// is half the previous resolution, computed with the rounded mean of each 2x2 block.
/// The first level is the given matrix.
#[allow(clippy::cast_possible_truncation)]
pub fn mean_pyramid(nb_levels: usize, mat: GrayMatrix) -> Vec<GrayMatrix> {
    let mut pyr = vec![mat];
    while pyr.len() < nb_levels {
        let next = pyr.last().and_then(|m| {
            halve(m, |a, b, c, d| {
                let sum = u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d);
                ((sum + 2) / 4) as u8
            })
        });
        match next {
            Some(half) => pyr.push(half),
            None => break,
        }
    }
    pyr
}

/// Halve the resolution of a matrix by applying a function to each 2x2 block.
/// If one size of the matrix is < 2 then this function returns None.
/// If one size is odd, its last line/column is dropped.
pub fn halve<F, T, U>(mat: &DMatrix<T>, f: F) -> Option<DMatrix<U>>
where
    F: Fn(T, T, T, T) -> U,
    T: Scalar + Copy,
    U: Scalar,
{
    let (r, c) = mat.shape();
    let half_r = r / 2;
    let half_c = c / 2;
    if half_r == 0 || half_c == 0 {
        None
    } else {
        let half_mat = DMatrix::<U>::from_fn(half_r, half_c, |i, j| {
            let a = mat[(2 * i, 2 * j)];
            let b = mat[(2 * i + 1, 2 * j)];
            let c = mat[(2 * i, 2 * j + 1)];
            let d = mat[(2 * i + 1, 2 * j + 1)];
            f(a, b, c, d)
        });
        Some(half_mat)
    }
}

/// Coordinate at pyramid level `level` of a full resolution coordinate.
pub fn to_level(x: Float, level: usize) -> Float {
    (x + 0.5) / level_scale(level) - 0.5
}

/// Full resolution coordinate of a coordinate at pyramid level `level`.
pub fn from_level(x: Float, level: usize) -> Float {
    (x + 0.5) * level_scale(level) - 0.5
}

/// Size ratio between full resolution and a given level.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
pub fn level_scale(level: usize) -> Float {
    (2.0 as Float).powi(level as i32)
}

// TESTS #############################################################
