//! # Classical orbital elements
//!
//! This module defines [`ClassicalElements`] `(a, e, i, Ω, ω, ν)` and its
//! conversions to Cartesian vectors and to both equinoctial sets.
//!
//! ## Conventions
//!
//! 1. **a** – Semi-major axis, signed: `a > 0` ellipse, `a < 0` hyperbola.
//!    Parabolas have no finite `a`; they carry [`SemiMajorAxis::Parabolic`]
//!    with the periapsis distance instead.
//! 2. **e** – Eccentricity, `e ≥ 0`.
//! 3. **i** – Inclination, `[0, π]`.
//! 4. **Ω** – Right ascension of the ascending node.
//! 5. **ω** – Argument of periapsis.
//! 6. **ν** – True anomaly.
//!
//! The semi-major axis and the eccentricity must agree on the conic
//! (`a > 0 ⟺ e < 1`, `a < 0 ⟺ e > 1`). [`ClassicalElements::validate`]
//! enforces it at every conversion entry point.
//!
//! ## See also
//!
//! - [`crate::orbit_type::cartesian::CartesianState::to_classical`] – inverse of [`ClassicalElements::to_cartesian`].
//! - [`crate::orbit_type::equinoctial_element::EquinoctialElements`] – regularized, mean-longitude form.

use std::{f64::consts::PI, fmt};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{PARABOLIC_TOLERANCE, SINGULARITY_TOLERANCE},
    kepler::{principal_angle, true_to_mean_anomaly, wrap_to_pi, OrbitRegime},
    orbit_errors::OrbitError,
    orbit_type::{
        cartesian::CartesianState, equinoctial_element::EquinoctialElements,
        modified_equinoctial_element::ModifiedEquinoctialElements, RetrogradeFactor,
    },
    ref_system::perifocal_to_inertial,
};

/// Size parameter of a conic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SemiMajorAxis {
    /// Finite, signed semi-major axis.
    Finite(f64),
    /// Parabola sentinel: `a` is infinite, the size is given by the periapsis distance.
    Parabolic { periapsis_distance: f64 },
}

impl SemiMajorAxis {
    /// Numerical value, `+∞` for a parabola.
    pub fn value(&self) -> f64 {
        match self {
            SemiMajorAxis::Finite(a) => *a,
            SemiMajorAxis::Parabolic { .. } => f64::INFINITY,
        }
    }
}

/// Classical orbital elements (osculating, two-body).
///
/// Units
/// -----
/// * `semi_major_axis`: length unit of the caller (see [`SemiMajorAxis`]).
/// * `eccentricity`: unitless.
/// * `inclination`, `ascending_node_longitude`, `periapsis_argument`,
///   `true_anomaly`: radians.
///
/// See also
/// --------
/// * [`ClassicalElements::validate`] – consistency checks.
/// * [`ClassicalElements::to_cartesian`] – `coe → rv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassicalElements {
    pub semi_major_axis: SemiMajorAxis,
    pub eccentricity: f64,
    pub inclination: f64,
    pub ascending_node_longitude: f64,
    pub periapsis_argument: f64,
    pub true_anomaly: f64,
}

// -------------------------------------------------------------------------------------------------
// Shared equinoctial substitutions
// -------------------------------------------------------------------------------------------------

/// Orientation part of an equinoctial set: `(f, g, h, k, ϖ)` with `ϖ = ω + I·Ω`.
pub(crate) struct EquinoctialOrientation {
    pub f: f64,
    pub g: f64,
    pub h: f64,
    pub k: f64,
    pub lon_periapsis: f64,
}

/// Classical orientation angles recovered from an equinoctial set.
pub(crate) struct ClassicalOrientation {
    pub eccentricity: f64,
    pub inclination: f64,
    pub raan: f64,
    pub argp: f64,
    pub lon_periapsis: f64,
}

/// `(e, i, Ω, ω) → (f, g, h, k, ϖ)`.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidElements`] at the singular inclination of the
///   chosen factor (`i = π` direct, `i = 0` retrograde).
pub(crate) fn equinoctial_orientation(
    ecc: f64,
    inc: f64,
    raan: f64,
    argp: f64,
    retrograde: RetrogradeFactor,
) -> Result<EquinoctialOrientation, OrbitError> {
    let i_fac = retrograde.value();
    let singular = match retrograde {
        RetrogradeFactor::Direct => PI - inc < SINGULARITY_TOLERANCE,
        RetrogradeFactor::Retrograde => inc < SINGULARITY_TOLERANCE,
    };
    if singular {
        return Err(OrbitError::InvalidElements(format!(
            "equinoctial elements with {retrograde:?} factor are singular at i = {inc}"
        )));
    }

    let t = (inc / 2.0).tan().powf(i_fac);
    let lon_periapsis = argp + i_fac * raan;
    Ok(EquinoctialOrientation {
        f: ecc * lon_periapsis.cos(),
        g: ecc * lon_periapsis.sin(),
        h: t * raan.cos(),
        k: t * raan.sin(),
        lon_periapsis,
    })
}

/// `(f, g, h, k) → (e, i, Ω, ω, ϖ)`.
///
/// Degenerate cases follow the classical conventions: `Ω = 0` when the node
/// is undefined and `ω = 0` for circular orbits.
pub(crate) fn classical_orientation(
    f: f64,
    g: f64,
    h: f64,
    k: f64,
    retrograde: RetrogradeFactor,
) -> ClassicalOrientation {
    let i_fac = retrograde.value();

    let ecc = (f * f + g * g).sqrt();
    let t = (h * h + k * k).sqrt();

    let raan = if t < SINGULARITY_TOLERANCE {
        0.0
    } else {
        principal_angle(k.atan2(h))
    };

    let inclination = match retrograde {
        RetrogradeFactor::Direct => 2.0 * t.atan(),
        RetrogradeFactor::Retrograde => PI - 2.0 * t.atan(),
    };

    let lon_periapsis = if ecc < SINGULARITY_TOLERANCE {
        i_fac * raan
    } else {
        g.atan2(f)
    };

    ClassicalOrientation {
        eccentricity: ecc,
        inclination,
        raan,
        argp: principal_angle(lon_periapsis - i_fac * raan),
        lon_periapsis,
    }
}

impl ClassicalElements {
    /// Build and validate a set of classical elements.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] if the set is inconsistent (see [`Self::validate`]).
    pub fn new(
        semi_major_axis: SemiMajorAxis,
        eccentricity: f64,
        inclination: f64,
        ascending_node_longitude: f64,
        periapsis_argument: f64,
        true_anomaly: f64,
    ) -> Result<Self, OrbitError> {
        let elements = ClassicalElements {
            semi_major_axis,
            eccentricity,
            inclination,
            ascending_node_longitude,
            periapsis_argument,
            true_anomaly,
        };
        elements.validate()?;
        Ok(elements)
    }

    /// Build from the semi-latus rectum `p` instead of `a`.
    ///
    /// The size is stored as `a = p / (1 − e²)` or, inside the parabolic band,
    /// as a periapsis distance `p / 2`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `p ≤ 0`.
    /// * [`OrbitError::InvalidElements`] for any other inconsistency.
    pub fn from_semi_latus_rectum(
        p: f64,
        eccentricity: f64,
        inclination: f64,
        ascending_node_longitude: f64,
        periapsis_argument: f64,
        true_anomaly: f64,
    ) -> Result<Self, OrbitError> {
        if !(p.is_finite() && p > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "semi-latus rectum must be > 0, got {p}"
            )));
        }
        let semi_major_axis =
            match OrbitRegime::from_eccentricity(eccentricity, PARABOLIC_TOLERANCE)? {
                OrbitRegime::Parabolic => SemiMajorAxis::Parabolic {
                    periapsis_distance: 0.5 * p,
                },
                _ => SemiMajorAxis::Finite(p / (1.0 - eccentricity * eccentricity)),
            };
        let eccentricity = match semi_major_axis {
            SemiMajorAxis::Parabolic { .. } => 1.0,
            SemiMajorAxis::Finite(_) => eccentricity,
        };
        Self::new(
            semi_major_axis,
            eccentricity,
            inclination,
            ascending_node_longitude,
            periapsis_argument,
            true_anomaly,
        )
    }

    /// Conic regime of the elements.
    pub fn regime(&self) -> OrbitRegime {
        match self.semi_major_axis {
            SemiMajorAxis::Parabolic { .. } => OrbitRegime::Parabolic,
            SemiMajorAxis::Finite(_) if self.eccentricity < 1.0 => OrbitRegime::Elliptic,
            SemiMajorAxis::Finite(_) => OrbitRegime::Hyperbolic,
        }
    }

    /// Semi-latus rectum `p = a(1 − e²)`, or `2q` for a parabola.
    pub fn semi_latus_rectum(&self) -> f64 {
        match self.semi_major_axis {
            SemiMajorAxis::Finite(a) => a * (1.0 - self.eccentricity * self.eccentricity),
            SemiMajorAxis::Parabolic { periapsis_distance } => 2.0 * periapsis_distance,
        }
    }

    /// Periapsis distance `q = p / (1 + e)`.
    pub fn periapsis_distance(&self) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.eccentricity)
    }

    /// Check the internal consistency of the set.
    ///
    /// Errors
    /// ------
    /// [`OrbitError::InvalidElements`] when
    /// * `e` is negative or not finite, or an angle is not finite;
    /// * `i ∉ [0, π]`;
    /// * `a` and `e` disagree on the conic (`a > 0` with `e ≥ 1`, `a < 0` with
    ///   `e ≤ 1`, finite `a` inside the parabolic band, parabola outside it);
    /// * `p ≤ 0`;
    /// * an open orbit's true anomaly lies on or beyond its asymptotes.
    pub fn validate(&self) -> Result<(), OrbitError> {
        let e = self.eccentricity;
        if !e.is_finite() || e < 0.0 {
            return Err(OrbitError::InvalidElements(format!(
                "eccentricity must be finite and non-negative, got {e}"
            )));
        }
        let angles = [
            self.inclination,
            self.ascending_node_longitude,
            self.periapsis_argument,
            self.true_anomaly,
        ];
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(OrbitError::InvalidElements("angles must be finite".into()));
        }
        if !(0.0..=PI).contains(&self.inclination) {
            return Err(OrbitError::InvalidElements(format!(
                "inclination must lie in [0, pi], got {}",
                self.inclination
            )));
        }

        let parabolic_band = (e - 1.0).abs() <= PARABOLIC_TOLERANCE;
        match self.semi_major_axis {
            SemiMajorAxis::Finite(a) => {
                if !a.is_finite() || a == 0.0 {
                    return Err(OrbitError::InvalidElements(format!(
                        "semi-major axis must be finite and non-zero, got {a}"
                    )));
                }
                if parabolic_band {
                    return Err(OrbitError::InvalidElements(format!(
                        "e = {e} is parabolic but a finite semi-major axis {a} was given"
                    )));
                }
                if a > 0.0 && e > 1.0 {
                    return Err(OrbitError::InvalidElements(format!(
                        "a = {a} > 0 requires e < 1, got e = {e}"
                    )));
                }
                if a < 0.0 && e < 1.0 {
                    return Err(OrbitError::InvalidElements(format!(
                        "a = {a} < 0 requires e > 1, got e = {e}"
                    )));
                }
            }
            SemiMajorAxis::Parabolic { periapsis_distance } => {
                if !(periapsis_distance.is_finite() && periapsis_distance > 0.0) {
                    return Err(OrbitError::InvalidElements(format!(
                        "periapsis distance must be > 0, got {periapsis_distance}"
                    )));
                }
                if !parabolic_band {
                    return Err(OrbitError::InvalidElements(format!(
                        "parabolic sentinel requires e = 1, got e = {e}"
                    )));
                }
            }
        }

        let p = self.semi_latus_rectum();
        if !(p.is_finite() && p > 0.0) {
            return Err(OrbitError::InvalidElements(format!(
                "semi-latus rectum must be > 0, got {p}"
            )));
        }

        if self.regime() != OrbitRegime::Elliptic
            && 1.0 + e * self.true_anomaly.cos() <= 0.0
        {
            return Err(OrbitError::InvalidElements(format!(
                "true anomaly {} is beyond the asymptotes for e = {e}",
                self.true_anomaly
            )));
        }
        Ok(())
    }

    /// Mean anomaly at the current true anomaly (closed form).
    pub fn mean_anomaly(&self) -> Result<f64, OrbitError> {
        let e = match self.regime() {
            OrbitRegime::Parabolic => 1.0,
            _ => self.eccentricity,
        };
        true_to_mean_anomaly(self.true_anomaly, e, PARABOLIC_TOLERANCE)
    }

    /// Same orbit at another true anomaly, normalized to the regime's range.
    pub fn with_true_anomaly(&self, true_anomaly: f64) -> Self {
        let true_anomaly = match self.regime() {
            OrbitRegime::Elliptic => principal_angle(true_anomaly),
            _ => wrap_to_pi(true_anomaly),
        };
        ClassicalElements {
            true_anomaly,
            ..*self
        }
    }

    /// Convert to Cartesian vectors (`coe → rv`).
    ///
    /// The perifocal position and velocity are built from `(p, e, ν)` and
    /// rotated by `R3(Ω) · R1(i) · R3(ω)`.
    ///
    /// Arguments
    /// ---------
    /// * `mu` – gravitational parameter of the attractor.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `mu ≤ 0`.
    /// * [`OrbitError::InvalidElements`] if [`Self::validate`] fails.
    pub fn to_cartesian(&self, mu: f64) -> Result<CartesianState, OrbitError> {
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "gravitational parameter must be > 0, got {mu}"
            )));
        }
        self.validate()?;

        let p = self.semi_latus_rectum();
        let e = self.eccentricity;
        let (sin_nu, cos_nu) = self.true_anomaly.sin_cos();

        let r = p / (1.0 + e * cos_nu);
        let r_pqw = Vector3::new(r * cos_nu, r * sin_nu, 0.0);
        let v_pqw = (mu / p).sqrt() * Vector3::new(-sin_nu, e + cos_nu, 0.0);

        let rot = perifocal_to_inertial(
            self.ascending_node_longitude,
            self.inclination,
            self.periapsis_argument,
        );

        Ok(CartesianState::new(rot * r_pqw, rot * v_pqw))
    }

    /// Convert to equinoctial elements (mean longitude).
    ///
    /// Arguments
    /// ---------
    /// * `retrograde` – retrograde factor, auto-detected from `i` when `None`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] at the singular inclination of the
    ///   chosen factor, or if [`Self::validate`] fails.
    pub fn to_equinoctial(
        &self,
        retrograde: Option<RetrogradeFactor>,
    ) -> Result<EquinoctialElements, OrbitError> {
        self.validate()?;
        let retrograde = RetrogradeFactor::resolve(retrograde, self.inclination);
        let o = equinoctial_orientation(
            self.eccentricity,
            self.inclination,
            self.ascending_node_longitude,
            self.periapsis_argument,
            retrograde,
        )?;
        let mean_anomaly = self.mean_anomaly()?;
        let mean_longitude = match self.regime() {
            OrbitRegime::Elliptic => principal_angle(o.lon_periapsis + mean_anomaly),
            // open orbits: λ − atan2(g, f) must give back the unwrapped M
            _ => wrap_to_pi(o.lon_periapsis) + mean_anomaly,
        };

        Ok(EquinoctialElements {
            semi_latus_rectum: self.semi_latus_rectum(),
            eccentricity_cos_lon: o.f,
            eccentricity_sin_lon: o.g,
            tan_half_incl_cos_node: o.h,
            tan_half_incl_sin_node: o.k,
            mean_longitude,
            retrograde,
        })
    }

    /// Convert to modified equinoctial elements (true longitude).
    ///
    /// Errors
    /// ------
    /// * Same as [`Self::to_equinoctial`].
    pub fn to_modified_equinoctial(
        &self,
        retrograde: Option<RetrogradeFactor>,
    ) -> Result<ModifiedEquinoctialElements, OrbitError> {
        self.validate()?;
        let retrograde = RetrogradeFactor::resolve(retrograde, self.inclination);
        let o = equinoctial_orientation(
            self.eccentricity,
            self.inclination,
            self.ascending_node_longitude,
            self.periapsis_argument,
            retrograde,
        )?;

        Ok(ModifiedEquinoctialElements {
            semi_latus_rectum: self.semi_latus_rectum(),
            eccentricity_cos_lon: o.f,
            eccentricity_sin_lon: o.g,
            tan_half_incl_cos_node: o.h,
            tan_half_incl_sin_node: o.k,
            true_longitude: principal_angle(o.lon_periapsis + self.true_anomaly),
            retrograde,
        })
    }
}

impl fmt::Display for ClassicalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rad_to_deg = 180.0 / PI;
        writeln!(f, "Classical Elements")?;
        writeln!(f, "-------------------------------------------")?;
        match self.semi_major_axis {
            SemiMajorAxis::Finite(a) => {
                writeln!(f, "  a   (semi-major axis)       = {a:.6}")?;
            }
            SemiMajorAxis::Parabolic { periapsis_distance } => {
                writeln!(
                    f,
                    "  q   (periapsis distance)    = {periapsis_distance:.6} (parabolic)"
                )?;
            }
        }
        writeln!(
            f,
            "  e   (eccentricity)          = {:.6}",
            self.eccentricity
        )?;
        writeln!(
            f,
            "  i   (inclination)           = {:.6} rad ({:.6}°)",
            self.inclination,
            self.inclination * rad_to_deg
        )?;
        writeln!(
            f,
            "  Ω   (longitude of node)     = {:.6} rad ({:.6}°)",
            self.ascending_node_longitude,
            self.ascending_node_longitude * rad_to_deg
        )?;
        writeln!(
            f,
            "  ω   (argument of periapsis) = {:.6} rad ({:.6}°)",
            self.periapsis_argument,
            self.periapsis_argument * rad_to_deg
        )?;
        write!(
            f,
            "  ν   (true anomaly)          = {:.6} rad ({:.6}°)",
            self.true_anomaly,
            self.true_anomaly * rad_to_deg
        )
    }
}
