//! # Cartesian state vectors
//!
//! [`CartesianState`] holds a position/velocity pair relative to the attractor
//! and implements the conversion to classical elements (`rv → coe`).
//!
//! ## Singular geometries
//!
//! | case                  | convention                                              |
//! |-----------------------|---------------------------------------------------------|
//! | circular (e ≈ 0)      | `ω = 0`, ν is the argument of latitude                 |
//! | equatorial (sin i ≈ 0)| `Ω = 0`, ω measured from the x-axis in the orbit's sense |
//! | both                  | `Ω = ω = 0`, ν is the true longitude                   |
//! | rectilinear (h ≈ 0)   | rejected with [`OrbitError::DegenerateGeometry`]        |

use nalgebra::{Vector3, Vector6};
use std::fmt;

use crate::{
    constants::{PARABOLIC_TOLERANCE, SINGULARITY_TOLERANCE, TRIG_DOMAIN_SLACK},
    kepler::{principal_angle, wrap_to_pi, OrbitRegime},
    orbit_errors::OrbitError,
    orbit_type::classical_element::{ClassicalElements, SemiMajorAxis},
};

/// Position and velocity of a body relative to its attractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

/// `acos` with round-off clamping.
///
/// Arguments slightly outside `[-1, 1]` (by at most [`TRIG_DOMAIN_SLACK`]) are
/// clamped, anything further out is reported as non-physical.
pub(crate) fn clamped_acos(x: f64, what: &str) -> Result<f64, OrbitError> {
    if !x.is_finite() || x.abs() > 1.0 + TRIG_DOMAIN_SLACK {
        return Err(OrbitError::InvalidElements(format!(
            "cosine of {what} out of domain: {x}"
        )));
    }
    Ok(x.clamp(-1.0, 1.0).acos())
}

/// Signed angle from `from` to `to` around the unit axis `axis`.
fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    axis.dot(&from.cross(to)).atan2(from.dot(to))
}

impl CartesianState {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        CartesianState { position, velocity }
    }

    /// Pack as `[x, y, z, vx, vy, vz]`.
    pub fn to_vector6(&self) -> Vector6<f64> {
        Vector6::new(
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
        )
    }

    /// Unpack from `[x, y, z, vx, vy, vz]`.
    pub fn from_vector6(y: &Vector6<f64>) -> Self {
        CartesianState {
            position: y.fixed_rows::<3>(0).into_owned(),
            velocity: y.fixed_rows::<3>(3).into_owned(),
        }
    }

    /// Check the vectors are finite and the position is not null.
    pub fn validate(&self) -> Result<(), OrbitError> {
        if !(self.position.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite()))
        {
            return Err(OrbitError::InvalidArgument(
                "state vector components must be finite".into(),
            ));
        }
        if self.position.norm() == 0.0 {
            return Err(OrbitError::InvalidArgument(
                "position must not be the null vector".into(),
            ));
        }
        Ok(())
    }

    /// Specific angular momentum `h = r × v`.
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.position.cross(&self.velocity)
    }

    /// Specific orbital energy `v²/2 − μ/r`.
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.position.norm()
    }

    /// Eccentricity vector `((v² − μ/r)·r − (r·v)·v) / μ`.
    pub fn eccentricity_vector(&self, mu: f64) -> Vector3<f64> {
        let r = &self.position;
        let v = &self.velocity;
        ((v.norm_squared() - mu / r.norm()) * r - r.dot(v) * v) / mu
    }

    /// Convert to classical orbital elements.
    ///
    /// Arguments
    /// ---------
    /// * `mu` – gravitational parameter of the attractor.
    ///
    /// Return
    /// ------
    /// * [`ClassicalElements`] with Ω, ω in `[0, 2π)`, ν in `[0, 2π)` for
    ///   closed orbits and in `(−π, π]` for open ones. Parabolic orbits
    ///   (|e − 1| within [`PARABOLIC_TOLERANCE`]) carry
    ///   [`SemiMajorAxis::Parabolic`].
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] for `mu ≤ 0` or non-finite / null vectors.
    /// * [`OrbitError::DegenerateGeometry`] for a rectilinear state (h ≈ 0).
    /// * [`OrbitError::InvalidElements`] if an inverse-trig argument is out of domain.
    ///
    /// See also
    /// --------
    /// * [`ClassicalElements::to_cartesian`] – inverse conversion.
    pub fn to_classical(&self, mu: f64) -> Result<ClassicalElements, OrbitError> {
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "gravitational parameter must be > 0, got {mu}"
            )));
        }
        self.validate()?;

        let r = &self.position;
        let v = &self.velocity;

        let h = self.angular_momentum();
        let h_norm = h.norm();
        if h_norm <= SINGULARITY_TOLERANCE * r.norm() * v.norm() || h_norm == 0.0 {
            return Err(OrbitError::DegenerateGeometry(
                "zero angular momentum (rectilinear orbit)".into(),
            ));
        }
        let h_hat = h / h_norm;

        let p = h_norm * h_norm / mu;
        let e_vec = self.eccentricity_vector(mu);
        let ecc = e_vec.norm();

        let inc = clamped_acos(h_hat.z, "inclination")?;

        let sin_inc = (h_hat.x * h_hat.x + h_hat.y * h_hat.y).sqrt();
        let equatorial = sin_inc < SINGULARITY_TOLERANCE;
        let circular = ecc < SINGULARITY_TOLERANCE;

        // reference direction: ascending node, or the x-axis when the node is undefined
        let (raan, node_dir) = if equatorial {
            (0.0, Vector3::x())
        } else {
            let n = Vector3::z().cross(&h);
            let n_hat = n / n.norm();
            (principal_angle(n_hat.y.atan2(n_hat.x)), n_hat)
        };

        let (argp, nu) = if circular {
            (0.0, signed_angle(&node_dir, r, &h_hat))
        } else {
            let e_hat = e_vec / ecc;
            (
                principal_angle(signed_angle(&node_dir, &e_hat, &h_hat)),
                signed_angle(&e_hat, r, &h_hat),
            )
        };

        let regime = OrbitRegime::from_eccentricity(ecc, PARABOLIC_TOLERANCE)?;
        let (semi_major_axis, eccentricity, true_anomaly) = match regime {
            OrbitRegime::Elliptic => (
                SemiMajorAxis::Finite(p / (1.0 - ecc * ecc)),
                ecc,
                principal_angle(nu),
            ),
            OrbitRegime::Hyperbolic => (
                SemiMajorAxis::Finite(p / (1.0 - ecc * ecc)),
                ecc,
                wrap_to_pi(nu),
            ),
            OrbitRegime::Parabolic => (
                SemiMajorAxis::Parabolic {
                    periapsis_distance: 0.5 * p,
                },
                1.0,
                wrap_to_pi(nu),
            ),
        };

        Ok(ClassicalElements {
            semi_major_axis,
            eccentricity,
            inclination: inc,
            ascending_node_longitude: raan,
            periapsis_argument: argp,
            true_anomaly,
        })
    }
}

impl fmt::Display for CartesianState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cartesian state")?;
        writeln!(
            f,
            "  r = [{:.9}, {:.9}, {:.9}]",
            self.position.x, self.position.y, self.position.z
        )?;
        write!(
            f,
            "  v = [{:.9}, {:.9}, {:.9}]",
            self.velocity.x, self.velocity.y, self.velocity.z
        )
    }
}
