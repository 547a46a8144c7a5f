//! # Elementary rotations
//!
//! Rotation helpers used by the element conversions. Only the two operations the
//! conversions need are provided: a single-axis rotation and the 3-1-3 sequence
//! mapping the perifocal frame onto the reference frame of the state.
//!
//! Frames themselves are opaque to this crate (see [`crate::orbit_state::Frame`]);
//! any change of reference frame is delegated to the caller.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Coordinate axis around which an elementary rotation is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Build the active rotation matrix of angle `alpha` around `axis`.
///
/// Arguments
/// ---------
/// * `alpha` – rotation angle in radians (counter-clockwise, right-hand rule).
/// * `axis` – rotation axis.
///
/// Return
/// ------
/// * A 3×3 rotation matrix `R` such that `R * v` rotates `v` by `alpha`.
pub fn rotmt(alpha: f64, axis: Axis) -> Matrix3<f64> {
    let axis = match axis {
        Axis::X => Vector3::x_axis(),
        Axis::Y => Vector3::y_axis(),
        Axis::Z => Vector3::z_axis(),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Rotation from the perifocal (PQW) frame to the reference frame.
///
/// Implements the classical 3-1-3 sequence `R3(Ω) · R1(i) · R3(ω)`.
///
/// Arguments
/// ---------
/// * `raan` – right ascension of the ascending node Ω (rad).
/// * `inc` – inclination i (rad).
/// * `argp` – argument of periapsis ω (rad).
///
/// See also
/// --------
/// * [`rotmt`] – elementary rotation used for each factor.
pub fn perifocal_to_inertial(raan: f64, inc: f64, argp: f64) -> Matrix3<f64> {
    rotmt(raan, Axis::Z) * rotmt(inc, Axis::X) * rotmt(argp, Axis::Z)
}

#[cfg(test)]
mod ref_system_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn quarter_turn_around_z_maps_x_to_y() {
        let r = rotmt(FRAC_PI_2, Axis::Z) * Vector3::x();
        assert_abs_diff_eq!(r, Vector3::y(), epsilon = 1e-15);
    }

    #[test]
    fn perifocal_rotation_is_orthonormal() {
        let m = perifocal_to_inertial(1.2, 0.4, -2.3);
        assert_abs_diff_eq!(m * m.transpose(), Matrix3::identity(), epsilon = 1e-14);
        assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn perifocal_z_is_orbit_normal() {
        // the third column is the angular momentum direction
        let (raan, inc) = (0.7_f64, 0.3_f64);
        let m = perifocal_to_inertial(raan, inc, 1.1);
        let w = m.column(2).into_owned();
        let expected = Vector3::new(inc.sin() * raan.sin(), -inc.sin() * raan.cos(), inc.cos());
        assert_abs_diff_eq!(w, expected, epsilon = 1e-14);
    }
}
