// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Linear triangulation of points seen in two calibrated views.

use nalgebra::RowVector4;

use crate::misc::type_aliases::{Float, Mat34, Mat4, Point2, Point3};

/// Homogeneous coordinates with a smaller last component
/// are considered to be at infinity.
const EPSILON_HOMOGENEOUS: Float = 1e-12;

/// Triangulate one correspondence with the DLT method.
///
/// `p1` and `p2` are the 3x4 projection matrices of both views.
/// Returns `None` for points at infinity.
pub fn triangulate(p1: &Mat34, p2: &Mat34, x1: &Point2, x2: &Point2) -> Option<Point3> {
    let row = |p: &Mat34, i: usize| -> RowVector4<Float> { p.row(i).into_owned() };
    let a = Mat4::from_rows(&[
        x1.x * row(p1, 2) - row(p1, 0),
        x1.y * row(p1, 2) - row(p1, 1),
        x2.x * row(p2, 2) - row(p2, 0),
        x2.y * row(p2, 2) - row(p2, 1),
    ]);
    // The solution is the right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd.singular_values.argmin();
    let xh = v_t.row(min_idx);
    let w = xh[3];
    if w.abs() < EPSILON_HOMOGENEOUS {
        None
    } else {
        Some(Point3::new(xh[0] / w, xh[1] / w, xh[2] / w))
    }
}

/// Triangulate a set of correspondences.
///
/// Points at infinity are returned as `None` so that the output
/// stays index aligned with the input.
pub fn triangulate_all(
    p1: &Mat34,
    p2: &Mat34,
    pts1: &[Point2],
    pts2: &[Point2],
) -> Vec<Option<Point3>> {
    assert_eq!(pts1.len(), pts2.len(), "Unpaired correspondences");
    pts1.iter()
        .zip(pts2.iter())
        .map(|(x1, x2)| triangulate(p1, p2, x1, x2))
        .collect()
}

/// Mask of the triangulated points closer than `max_range` from the camera center.
/// Points at infinity are discarded.
pub fn range_mask(points: &[Option<Point3>], max_range: Float) -> Vec<bool> {
    points
        .iter()
        .map(|p| match p {
            Some(p) => p.coords.norm() < max_range,
            None => false,
        })
        .collect()
}

/// Project a 3D point with a projection matrix.
pub fn project(p: &Mat34, point: &Point3) -> Option<Point2> {
    let uvw = p * point.to_homogeneous();
    if uvw.z.abs() < EPSILON_HOMOGENEOUS {
        None
    } else {
        Some(Point2::new(uvw.x / uvw.z, uvw.y / uvw.z))
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::helper;
    use crate::misc::type_aliases::Mat3;
    use approx;

    /// Two cameras, the right one being shifted by `baseline` along x.
    fn stereo_rig(baseline: Float) -> (Mat34, Mat34) {
        let k = Mat3::new(700.0, 0.0, 320.0, 0.0, 700.0, 240.0, 0.0, 0.0, 1.0);
        let left = k * Mat34::identity();
        let mut right_extrinsics = Mat34::identity();
        right_extrinsics[(0, 3)] = -baseline;
        (left, k * right_extrinsics)
    }

    #[test]
    fn triangulation_round_trip() {
        let (p1, p2) = stereo_rig(1.0);
        let point = Point3::new(0.0, 0.0, 10.0);
        let x1 = project(&p1, &point).unwrap();
        let x2 = project(&p2, &point).unwrap();
        assert!((x1.x - x2.x - 70.0).abs() < 1e-9);
        let recovered = triangulate(&p1, &p2, &x1, &x2).unwrap();
        approx::assert_abs_diff_eq!(point, recovered, epsilon = 1e-3);
    }

    #[test]
    fn triangulation_of_off_axis_points() {
        let (p1, p2) = stereo_rig(0.54);
        for point in &[
            Point3::new(-3.0, 1.5, 12.0),
            Point3::new(2.0, -0.5, 35.0),
            Point3::new(0.1, 0.2, 4.0),
        ] {
            let x1 = project(&p1, point).unwrap();
            let x2 = project(&p2, point).unwrap();
            let recovered = triangulate(&p1, &p2, &x1, &x2).unwrap();
            approx::assert_abs_diff_eq!(*point, recovered, epsilon = 1e-6);
        }
    }

    #[test]
    fn range_filter_keeps_order() {
        let points: Vec<Option<Point3>> = [5.0, 50.0, 90.0, 120.0]
            .iter()
            .map(|&d| Some(Point3::new(0.0, 0.0, d)))
            .collect();
        let mask = range_mask(&points, 80.0);
        assert_eq!(vec![true, true, false, false], mask);
        let kept: Vec<Float> = helper::keep_where(&points, &mask)
            .iter()
            .map(|p| p.unwrap().coords.norm())
            .collect();
        assert_eq!(vec![5.0, 50.0], kept);
    }

    #[test]
    fn points_at_infinity_are_discarded() {
        assert_eq!(vec![false], range_mask(&[None], 80.0));
    }
}
