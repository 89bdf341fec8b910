// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lie algebra/group functions for 3D rotations, in matrix form.
//!
//! Interesting reads:
//! - Sophus c++ library: <https://github.com/strasdat/Sophus>
//! - Ethan Eade course on Lie Groups for 2D and 3D transformations:
//!     - details: <http://ethaneade.com/lie.pdf>
//!     - summary: <http://ethaneade.com/lie_groups.pdf>

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Threshold for using Taylor series in computations.
const EPSILON_TAYLOR_SERIES: Float = 1e-4;
const _1_6: Float = 1.0 / 6.0;

/// Hat operator.
/// Goes from so3 parameterization to so3 element (skew-symmetric matrix).
/// Also known as the cross product matrix: `hat(a) * b == a.cross(&b)`.
#[rustfmt::skip]
pub fn hat(w: Vec3) -> Mat3 {
    Mat3::new(
         0.0,  -w.z,   w.y,
         w.z,   0.0,  -w.x,
        -w.y,   w.x,   0.0,
    )
}

/// Compute the exponential map from Lie algebra so3 to Lie group SO3,
/// with the Rodrigues formula.
pub fn exp(w: Vec3) -> Mat3 {
    let theta_2 = w.norm_squared();
    let w_hat = hat(w);
    let (a, b) = if theta_2 < EPSILON_TAYLOR_SERIES {
        (1.0 - _1_6 * theta_2, 0.5 - theta_2 / 24.0)
    } else {
        let theta = theta_2.sqrt();
        (theta.sin() / theta, (1.0 - theta.cos()) / theta_2)
    };
    Mat3::identity() + a * w_hat + b * w_hat * w_hat
}

/// Closest rotation matrix (in Frobenius norm) to a given 3x3 matrix.
///
/// Returns `None` if the SVD does not converge.
pub fn closest_rotation(mat: &Mat3) -> Option<Mat3> {
    let svd = mat.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut d = Mat3::identity();
    if (u * v_t).determinant() < 0.0 {
        d[(2, 2)] = -1.0;
    }
    Some(u * d * v_t)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use approx;
    use quickcheck_macros;

    #[test]
    fn exp_of_zero_is_identity() {
        assert_eq!(Mat3::identity(), exp(Vec3::zeros()));
    }

    #[test]
    fn exp_quarter_turn_around_z() {
        let r = exp(Vec3::new(0.0, 0.0, 0.5 * std::f64::consts::PI));
        approx::assert_relative_eq!(Vec3::y(), r * Vec3::x(), epsilon = 1e-12);
        // Taylor expansion branch.
        let small = exp(Vec3::new(0.0, 0.0, 1e-3));
        approx::assert_relative_eq!(1e-3_f64.sin(), small[(1, 0)], epsilon = 1e-9);
    }

    #[test]
    fn exp_is_a_rotation() {
        let r = exp(Vec3::new(0.3, -0.2, 1.1));
        approx::assert_relative_eq!(Mat3::identity(), r * r.transpose(), epsilon = 1e-12);
        approx::assert_relative_eq!(1.0, r.determinant(), epsilon = 1e-12);
    }

    #[test]
    fn closest_rotation_of_scaled_rotation() {
        let r = exp(Vec3::new(0.1, 0.2, 0.3));
        let projected = closest_rotation(&(2.5 * r)).unwrap();
        approx::assert_relative_eq!(r, projected, epsilon = 1e-9);
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn hat_is_cross_product(a: (i16, i16, i16), b: (i16, i16, i16)) -> bool {
        let a = Vec3::new(a.0.into(), a.1.into(), a.2.into());
        let b = Vec3::new(b.0.into(), b.1.into(), b.2.into());
        hat(a) * b == a.cross(&b)
    }
}
