// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! FAST-9 corner detection with non-maximum suppression.

use nalgebra::DMatrix;

use crate::misc::type_aliases::GrayMatrix;

/// Offsets `(dx, dy)` of the Bresenham circle of radius 3, in circular order.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Minimum length of the contiguous arc.
const ARC_LENGTH: usize = 9;

/// A corner at integer coordinates `(x, y)` with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Corner score, strictly positive.
    pub score: u32,
}

/// Detect FAST-9 corners at least `border` pixels away from the image borders.
/// Only local maxima of the score in a 3x3 neighborhood are kept.
pub fn detect(img: &GrayMatrix, threshold: u8, border: usize) -> Vec<Corner> {
    let (nrows, ncols) = img.shape();
    let border = border.max(3);
    if nrows <= 2 * border || ncols <= 2 * border {
        return Vec::new();
    }
    let scores = DMatrix::from_fn(nrows, ncols, |y, x| {
        if y < border || x < border || y >= nrows - border || x >= ncols - border {
            0
        } else {
            score(img, x, y, threshold)
        }
    });
    let mut corners = Vec::new();
    for x in border..(ncols - border) {
        for y in border..(nrows - border) {
            let s = scores[(y, x)];
            if s > 0 && is_local_max(&scores, x, y) {
                corners.push(Corner { x, y, score: s });
            }
        }
    }
    corners
}

/// Strict maximum among already visited neighbors, non-strict for the others,
/// so that plateaus keep exactly one corner.
fn is_local_max(scores: &DMatrix<u32>, x: usize, y: usize) -> bool {
    let s = scores[(y, x)];
    for dx in 0..3 {
        for dy in 0..3 {
            let (nx, ny) = (x + dx - 1, y + dy - 1);
            if (nx, ny) == (x, y) {
                continue;
            }
            let visited = nx < x || (nx == x && ny < y);
            let n = scores[(ny, nx)];
            if (visited && n >= s) || (!visited && n > s) {
                return false;
            }
        }
    }
    true
}

/// FAST score of a pixel, 0 if it is not a corner.
///
/// The score is the sum of absolute differences exceeding the threshold
/// over the pixels of the circle on the detected side (brighter or darker).
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub fn score(img: &GrayMatrix, x: usize, y: usize, threshold: u8) -> u32 {
    let p = i32::from(img[(y, x)]);
    let t = i32::from(threshold);
    let mut diffs = [0_i32; 16];
    for (d, &(dx, dy)) in diffs.iter_mut().zip(CIRCLE.iter()) {
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        *d = i32::from(img[(py, px)]) - p;
    }
    let brighter = longest_arc(&diffs, |d| d > t);
    let darker = longest_arc(&diffs, |d| d < -t);
    if brighter < ARC_LENGTH && darker < ARC_LENGTH {
        return 0;
    }
    let sum_bright: i32 = diffs.iter().filter(|&&d| d > t).map(|&d| d - t).sum();
    let sum_dark: i32 = diffs.iter().filter(|&&d| d < -t).map(|&d| -d - t).sum();
    match (brighter >= ARC_LENGTH, darker >= ARC_LENGTH) {
        (true, false) => sum_bright as u32,
        (false, true) => sum_dark as u32,
        _ => sum_bright.max(sum_dark) as u32,
    }
}

/// Longest circular run of consecutive pixels satisfying a predicate.
fn longest_arc<F: Fn(i32) -> bool>(diffs: &[i32; 16], predicate: F) -> usize {
    let mut best = 0;
    let mut current = 0;
    // Going around twice handles arcs wrapping over the start.
    for i in 0..32 {
        if predicate(diffs[i % 16]) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best.min(16)
}

// TESTS #############################################################
