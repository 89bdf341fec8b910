// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-view geometry: fundamental and essential matrices, homographies,
//! and relative pose recovery.
//!
//! Correspondences are pairs `(x1, x2)` of pixel coordinates.
//! The epipolar constraint reads `x2^T * F * x1 = 0`,
//! and recovered motions `(R, t)` map points from the first
//! camera frame to the second one: `X2 = R * X1 + t`.

use nalgebra::{DMatrix, DVector};

use crate::math::{ransac::RobustModel, so3, triangulation};
use crate::misc::type_aliases::{Float, Mat3, Mat34, Point2, Vec3};

/// A pair of corresponding pixel coordinates in two images.
pub type Correspondence = (Point2, Point2);

/// Below this value, a normalization term is considered null.
const EPSILON: Float = 1e-12;

// Fundamental matrix ##########################################################

/// Normalized 8-point estimation of the fundamental matrix.
///
/// The returned matrix has rank 2 and is scaled such that `F[(2, 2)] == 1`
/// when possible, unit Frobenius norm otherwise.
pub struct FundamentalModel;

impl RobustModel<Correspondence> for FundamentalModel {
    type Model = Mat3;

    fn min_sample_size(&self) -> usize {
        8
    }

    fn estimate(&self, data: &[&Correspondence]) -> Option<Mat3> {
        if data.len() < 8 {
            return None;
        }
        let (n1, t1) = hartley_normalization(data.iter().map(|c| &c.0))?;
        let (n2, t2) = hartley_normalization(data.iter().map(|c| &c.1))?;
        let a = DMatrix::from_fn(data.len(), 9, |i, j| {
            let (x1, x2) = (&n1[i], &n2[i]);
            let (u1, v1) = (x1.x, x1.y);
            let (u2, v2) = (x2.x, x2.y);
            [
                u2 * u1, u2 * v1, u2, v2 * u1, v2 * v1, v2, u1, v1, 1.0,
            ][j]
        });
        let f = mat3_from_row_vector(&null_vector(a)?);
        let f = t2.transpose() * enforce_rank_2(&f)? * t1;
        Some(normalize_scale(f))
    }

    fn residual(&self, f: &Mat3, data: &Correspondence) -> Float {
        sampson_distance(f, &data.0, &data.1)
    }
}

/// First order approximation of the squared geometric error
/// of a correspondence for a fundamental matrix.
pub fn sampson_distance(f: &Mat3, x1: &Point2, x2: &Point2) -> Float {
    let x1 = x1.to_homogeneous();
    let x2 = x2.to_homogeneous();
    let fx1 = f * x1;
    let ftx2 = f.transpose() * x2;
    let x2tfx1 = x2.dot(&fx1);
    let denom = fx1.x * fx1.x + fx1.y * fx1.y + ftx2.x * ftx2.x + ftx2.y * ftx2.y;
    if denom < EPSILON {
        Float::INFINITY
    } else {
        x2tfx1 * x2tfx1 / denom
    }
}

fn enforce_rank_2(m: &Mat3) -> Option<Mat3> {
    let mut svd = m.svd(true, true);
    let (min_idx, _) = svd.singular_values.argmin();
    svd.singular_values[min_idx] = 0.0;
    svd.recompose().ok()
}

// Essential matrix ############################################################

/// Essential matrix corresponding to a fundamental matrix
/// for two views sharing the same intrinsics: `E = K^T * F * K`.
pub fn essential_from_fundamental(f: &Mat3, k: &Mat3) -> Mat3 {
    k.transpose() * f * k
}

/// Essential matrix of a relative motion: `E = [t]x * R`.
pub fn essential_from_motion(rotation: &Mat3, translation: &Vec3) -> Mat3 {
    so3::hat(*translation) * rotation
}

/// Singular values of a matrix, sorted in ascending order.
pub fn sorted_singular_values(m: &Mat3) -> [Float; 3] {
    let s = m.singular_values();
    let mut values = [s[0], s[1], s[2]];
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values
}

/// An essential matrix is considered degenerate (too little parallax,
/// too few or ill-conditioned matches) if its middle singular value
/// is below a threshold.
pub fn is_degenerate(e: &Mat3, min_singular_value: Float) -> bool {
    let [_, middle, _] = sorted_singular_values(e);
    !(middle >= min_singular_value)
}

/// The four algebraic `(R, t)` decompositions of an essential matrix.
/// Translations have unit norm.
pub fn decompose_essential(e: &Mat3) -> Option<[(Mat3, Vec3); 4]> {
    let svd = e.svd(true, true);
    let mut u = svd.u?;
    let mut v_t = svd.v_t?;
    if u.determinant() < 0.0 {
        u = -u;
    }
    if v_t.determinant() < 0.0 {
        v_t = -v_t;
    }
    // Column of U associated with the smallest singular value.
    let (min_idx, _) = svd.singular_values.argmin();
    let t: Vec3 = u.column(min_idx).normalize();
    #[rustfmt::skip]
    let w = Mat3::new(
        0.0, -1.0, 0.0,
        1.0,  0.0, 0.0,
        0.0,  0.0, 1.0,
    );
    // The W construction assumes singular values sorted in decreasing order.
    let (u, v_t) = if min_idx == 2 {
        (u, v_t)
    } else {
        let perm = sorting_permutation(&svd.singular_values);
        (u * perm, perm.transpose() * v_t)
    };
    let r1 = so3::closest_rotation(&(u * w * v_t))?;
    let r2 = so3::closest_rotation(&(u * w.transpose() * v_t))?;
    Some([(r1, t), (r1, -t), (r2, t), (r2, -t)])
}

/// Permutation matrix P such that `U * P` has columns sorted
/// by decreasing singular values.
fn sorting_permutation(singular_values: &Vec3) -> Mat3 {
    let mut order = [0, 1, 2];
    order.sort_unstable_by(|&a, &b| {
        singular_values[b]
            .partial_cmp(&singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut perm = Mat3::zeros();
    for (new_col, &old_col) in order.iter().enumerate() {
        perm[(old_col, new_col)] = 1.0;
    }
    perm
}

/// Relative pose recovered from an essential matrix.
#[derive(Debug, Clone)]
pub struct RecoveredPose {
    /// Rotation such that `X2 = R * X1 + t`.
    pub rotation: Mat3,
    /// Unit translation direction.
    pub translation: Vec3,
    /// Number of correspondences in front of both cameras.
    pub nb_in_front: usize,
}

/// Select among the four decompositions of an essential matrix the one
/// placing the most triangulated correspondences in front of both cameras.
///
/// Only correspondences flagged in `mask` are considered.
pub fn recover_pose(
    e: &Mat3,
    correspondences: &[Correspondence],
    mask: &[bool],
    k: &Mat3,
) -> Option<RecoveredPose> {
    let k_inv = k.try_inverse()?;
    let normalized: Vec<(Point2, Point2)> = correspondences
        .iter()
        .zip(mask.iter())
        .filter(|(_, &inlier)| inlier)
        .map(|((x1, x2), _)| (normalize(&k_inv, x1), normalize(&k_inv, x2)))
        .collect();
    let p1 = Mat34::identity();
    let mut best: Option<RecoveredPose> = None;
    for (rotation, translation) in decompose_essential(e)?.iter() {
        let mut p2 = Mat34::zeros();
        p2.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        p2.set_column(3, translation);
        let nb_in_front = normalized
            .iter()
            .filter_map(|(x1, x2)| triangulation::triangulate(&p1, &p2, x1, x2))
            .filter(|x| x.z > 0.0 && (rotation * x.coords + translation).z > 0.0)
            .count();
        if best.as_ref().map_or(true, |b| nb_in_front > b.nb_in_front) {
            best = Some(RecoveredPose {
                rotation: *rotation,
                translation: *translation,
                nb_in_front,
            });
        }
    }
    best
}

fn normalize(k_inv: &Mat3, x: &Point2) -> Point2 {
    let v = k_inv * x.to_homogeneous();
    Point2::new(v.x / v.z, v.y / v.z)
}

// Homography ##################################################################

/// Normalized 4-point (DLT) estimation of a planar homography `x2 ~ H * x1`.
pub struct HomographyModel;

impl RobustModel<Correspondence> for HomographyModel {
    type Model = Mat3;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, data: &[&Correspondence]) -> Option<Mat3> {
        if data.len() < 4 {
            return None;
        }
        let (n1, t1) = hartley_normalization(data.iter().map(|c| &c.0))?;
        let (n2, t2) = hartley_normalization(data.iter().map(|c| &c.1))?;
        let a = DMatrix::from_fn(2 * data.len(), 9, |i, j| {
            let (x1, x2) = (&n1[i / 2], &n2[i / 2]);
            let (u1, v1) = (x1.x, x1.y);
            let (u2, v2) = (x2.x, x2.y);
            if i % 2 == 0 {
                [0.0, 0.0, 0.0, -u1, -v1, -1.0, v2 * u1, v2 * v1, v2][j]
            } else {
                [u1, v1, 1.0, 0.0, 0.0, 0.0, -u2 * u1, -u2 * v1, -u2][j]
            }
        });
        let h = mat3_from_row_vector(&null_vector(a)?);
        let h = t2.try_inverse()? * h * t1;
        Some(normalize_scale(h))
    }

    fn residual(&self, h: &Mat3, data: &Correspondence) -> Float {
        let (x1, x2) = data;
        let projected = h * x1.to_homogeneous();
        if projected.z.abs() < EPSILON {
            Float::INFINITY
        } else {
            let dx = projected.x / projected.z - x2.x;
            let dy = projected.y / projected.z - x2.y;
            dx * dx + dy * dy
        }
    }
}

// Helper ######################################################################

/// Translate points to their centroid and scale them to a mean distance of sqrt(2).
/// Returns the normalized points and the normalizing transformation.
fn hartley_normalization<'a, I>(points: I) -> Option<(Vec<Point2>, Mat3)>
where
    I: Iterator<Item = &'a Point2> + Clone,
{
    let n = points.clone().count() as Float;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (mx, my) = (sx / n, sy / n);
    let mean_dist = points
        .clone()
        .map(|p| ((p.x - mx).powi(2) + (p.y - my).powi(2)).sqrt())
        .sum::<Float>()
        / n;
    if mean_dist < EPSILON {
        return None;
    }
    let s = (2.0 as Float).sqrt() / mean_dist;
    #[rustfmt::skip]
    let t = Mat3::new(
        s,   0.0, -s * mx,
        0.0, s,   -s * my,
        0.0, 0.0,  1.0,
    );
    let normalized = points
        .map(|p| Point2::new(s * (p.x - mx), s * (p.y - my)))
        .collect();
    Some((normalized, t))
}

/// Unit vector minimizing `|A * x|`.
/// Under-determined systems are padded with null rows to get a full right basis.
fn null_vector(a: DMatrix<Float>) -> Option<DVector<Float>> {
    let (nrows, ncols) = a.shape();
    let a = if nrows < ncols {
        a.resize_vertically(ncols, 0.0)
    } else {
        a
    };
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd.singular_values.argmin();
    Some(v_t.row(min_idx).transpose())
}

fn mat3_from_row_vector(v: &DVector<Float>) -> Mat3 {
    Mat3::from_row_slice(v.as_slice())
}

/// Scale a 3x3 matrix so that its bottom right element is 1,
/// or to unit norm if that element vanishes.
fn normalize_scale(m: Mat3) -> Mat3 {
    let m22 = m[(2, 2)];
    if m22.abs() > EPSILON {
        m / m22
    } else {
        m / m.norm()
    }
}

// TESTS #############################################################
