//! # Orbit representations
//!
//! This module defines the four parameterizations an [`crate::orbit_state::OrbitState`]
//! can carry, and the conversions between them:
//!
//! - [`cartesian`] – position / velocity vectors `(r, v)`.
//! - [`classical_element`] – classical elements `(a, e, i, Ω, ω, ν)`, with a
//!   sentinel semi-major axis for parabolas.
//! - [`equinoctial_element`] – equinoctial elements `(p, f, g, h, k, λ)` with
//!   the **mean** longitude λ.
//! - [`modified_equinoctial_element`] – modified equinoctial elements
//!   `(p, f, g, h, k, L)` with the **true** longitude L.
//!
//! The [`Representation`] enum is the sum type stored in a state. Conversions
//! between element sets go through [`ClassicalElements`] (closed-form
//! substitutions) except the equinoctial → Cartesian paths, which are direct.
//!
//! ## Retrograde factor
//!
//! Both equinoctial sets are singular at `i = π` when built with the usual
//! `tan(i/2)`. The retrograde factor `I = ±1` switches to `cot(i/2)`, which
//! moves the singularity to `i = 0`. It is either supplied by the caller or
//! detected from the inclination with [`RetrogradeFactor::detect`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    kepler::KeplerParams,
    orbit_errors::OrbitError,
    orbit_type::{
        cartesian::CartesianState, classical_element::ClassicalElements,
        equinoctial_element::EquinoctialElements,
        modified_equinoctial_element::ModifiedEquinoctialElements,
    },
};

/// Position / velocity state vectors.
pub mod cartesian;

/// Classical orbital elements and their Cartesian conversion.
pub mod classical_element;

/// Equinoctial elements with mean longitude.
pub mod equinoctial_element;

/// Modified equinoctial elements with true longitude.
pub mod modified_equinoctial_element;

/// Retrograde factor `I` of the equinoctial parameterizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetrogradeFactor {
    /// `I = +1`, singular at `i = π`.
    #[default]
    Direct,
    /// `I = −1`, singular at `i = 0`.
    Retrograde,
}

impl RetrogradeFactor {
    /// Numerical value `±1`.
    pub fn value(self) -> f64 {
        match self {
            RetrogradeFactor::Direct => 1.0,
            RetrogradeFactor::Retrograde => -1.0,
        }
    }

    /// Pick the non-singular factor for a given inclination (retrograde iff `i > π/2`).
    pub fn detect(inclination: f64) -> Self {
        if inclination > std::f64::consts::FRAC_PI_2 {
            RetrogradeFactor::Retrograde
        } else {
            RetrogradeFactor::Direct
        }
    }

    /// Resolve an optional caller choice against the inclination.
    pub fn resolve(choice: Option<Self>, inclination: f64) -> Self {
        choice.unwrap_or_else(|| Self::detect(inclination))
    }
}

/// The active parameterization of an orbit state.
///
/// Variants
/// --------
/// * `Cartesian` – `(r, v)`; always defined except for the null position.
/// * `Classical` – `(a, e, i, Ω, ω, ν)`; singular for circular/equatorial orbits.
/// * `Equinoctial` – `(p, f, g, h, k, λ)`, mean longitude.
/// * `ModifiedEquinoctial` – `(p, f, g, h, k, L)`, true longitude.
///
/// See also
/// --------
/// * [`Representation::to_cartesian`] – conversion to state vectors.
/// * [`Representation::to_classical`] – conversion to classical elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Representation {
    Cartesian(CartesianState),
    Classical(ClassicalElements),
    Equinoctial(EquinoctialElements),
    ModifiedEquinoctial(ModifiedEquinoctialElements),
}

impl Representation {
    /// Check the internal consistency of the active parameterization.
    pub fn validate(&self) -> Result<(), OrbitError> {
        match self {
            Representation::Cartesian(c) => c.validate(),
            Representation::Classical(c) => c.validate(),
            Representation::Equinoctial(e) => e.validate(),
            Representation::ModifiedEquinoctial(m) => m.validate(),
        }
    }

    /// Convert to Cartesian vectors.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] for inconsistent elements.
    /// * [`OrbitError::Convergence`] if the mean-longitude Kepler solve fails.
    pub fn to_cartesian(&self, mu: f64, params: &KeplerParams) -> Result<CartesianState, OrbitError> {
        match self {
            Representation::Cartesian(c) => {
                c.validate()?;
                Ok(*c)
            }
            Representation::Classical(c) => c.to_cartesian(mu),
            Representation::Equinoctial(e) => e.to_cartesian(mu, params),
            Representation::ModifiedEquinoctial(m) => m.to_cartesian(mu),
        }
    }

    /// Convert to classical elements.
    pub fn to_classical(
        &self,
        mu: f64,
        params: &KeplerParams,
    ) -> Result<ClassicalElements, OrbitError> {
        match self {
            Representation::Cartesian(c) => c.to_classical(mu),
            Representation::Classical(c) => {
                c.validate()?;
                Ok(*c)
            }
            Representation::Equinoctial(e) => e.to_classical(params),
            Representation::ModifiedEquinoctial(m) => m.to_classical(),
        }
    }

    /// Convert to equinoctial elements (mean longitude).
    ///
    /// An existing equinoctial set is returned unchanged when no factor is
    /// requested or when the requested factor matches.
    pub fn to_equinoctial(
        &self,
        mu: f64,
        retrograde: Option<RetrogradeFactor>,
        params: &KeplerParams,
    ) -> Result<EquinoctialElements, OrbitError> {
        if let Representation::Equinoctial(e) = self {
            if retrograde.map_or(true, |r| r == e.retrograde) {
                e.validate()?;
                return Ok(*e);
            }
        }
        self.to_classical(mu, params)?.to_equinoctial(retrograde)
    }

    /// Convert to modified equinoctial elements (true longitude).
    pub fn to_modified_equinoctial(
        &self,
        mu: f64,
        retrograde: Option<RetrogradeFactor>,
        params: &KeplerParams,
    ) -> Result<ModifiedEquinoctialElements, OrbitError> {
        if let Representation::ModifiedEquinoctial(m) = self {
            if retrograde.map_or(true, |r| r == m.retrograde) {
                m.validate()?;
                return Ok(*m);
            }
        }
        self.to_classical(mu, params)?
            .to_modified_equinoctial(retrograde)
    }

    /// Get the underlying [`CartesianState`] if this is `Cartesian`.
    pub fn as_cartesian(&self) -> Option<&CartesianState> {
        if let Representation::Cartesian(ref c) = self {
            Some(c)
        } else {
            None
        }
    }

    /// Get the underlying [`ClassicalElements`] if this is `Classical`.
    pub fn as_classical(&self) -> Option<&ClassicalElements> {
        if let Representation::Classical(ref c) = self {
            Some(c)
        } else {
            None
        }
    }

    /// Get the underlying [`EquinoctialElements`] if this is `Equinoctial`.
    pub fn as_equinoctial(&self) -> Option<&EquinoctialElements> {
        if let Representation::Equinoctial(ref e) = self {
            Some(e)
        } else {
            None
        }
    }

    /// Get the underlying [`ModifiedEquinoctialElements`] if this is `ModifiedEquinoctial`.
    pub fn as_modified_equinoctial(&self) -> Option<&ModifiedEquinoctialElements> {
        if let Representation::ModifiedEquinoctial(ref m) = self {
            Some(m)
        } else {
            None
        }
    }
}

impl From<CartesianState> for Representation {
    fn from(c: CartesianState) -> Self {
        Representation::Cartesian(c)
    }
}

impl From<ClassicalElements> for Representation {
    fn from(c: ClassicalElements) -> Self {
        Representation::Classical(c)
    }
}

impl From<EquinoctialElements> for Representation {
    fn from(e: EquinoctialElements) -> Self {
        Representation::Equinoctial(e)
    }
}

impl From<ModifiedEquinoctialElements> for Representation {
    fn from(m: ModifiedEquinoctialElements) -> Self {
        Representation::ModifiedEquinoctial(m)
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Cartesian(c) => {
                writeln!(f, "[Cartesian representation]")?;
                write!(f, "{c}")
            }
            Representation::Classical(c) => {
                writeln!(f, "[Classical representation]")?;
                write!(f, "{c}")
            }
            Representation::Equinoctial(e) => {
                writeln!(f, "[Equinoctial representation]")?;
                write!(f, "{e}")
            }
            Representation::ModifiedEquinoctial(m) => {
                writeln!(f, "[Modified equinoctial representation]")?;
                write!(f, "{m}")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod orbit_type_test {
    use super::*;
    use crate::orbit_type::classical_element::SemiMajorAxis;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    /// Compare two angles modulo 2π with an absolute epsilon.
    pub(crate) fn assert_angle_eq(a: f64, b: f64, eps: f64) {
        let d = (a - b + PI).rem_euclid(2.0 * PI) - PI;
        assert_abs_diff_eq!(d, 0.0, epsilon = eps);
    }

    fn sample_classical() -> ClassicalElements {
        ClassicalElements {
            semi_major_axis: SemiMajorAxis::Finite(12_000.0),
            eccentricity: 0.2,
            inclination: 0.6,
            ascending_node_longitude: 1.2,
            periapsis_argument: 2.1,
            true_anomaly: 0.4,
        }
    }

    #[test]
    fn retrograde_factor_detection() {
        assert_eq!(RetrogradeFactor::detect(0.3), RetrogradeFactor::Direct);
        assert_eq!(RetrogradeFactor::detect(2.9), RetrogradeFactor::Retrograde);
        assert_eq!(
            RetrogradeFactor::resolve(Some(RetrogradeFactor::Direct), 2.9),
            RetrogradeFactor::Direct
        );
        assert_eq!(RetrogradeFactor::Retrograde.value(), -1.0);
    }

    #[test]
    fn every_representation_reaches_the_same_vectors() {
        let mu = 398_600.0;
        let params = KeplerParams::default();
        let coe = sample_classical();
        let reference = coe.to_cartesian(mu).unwrap();

        let reprs = [
            Representation::Classical(coe),
            Representation::Equinoctial(coe.to_equinoctial(None).unwrap()),
            Representation::ModifiedEquinoctial(coe.to_modified_equinoctial(None).unwrap()),
            Representation::Cartesian(reference),
        ];

        // the equinoctial path goes through Kepler's equation: relative bounds
        let r_tol = 1e-12 * reference.position.norm();
        let v_tol = 1e-12 * reference.velocity.norm();
        for repr in reprs {
            let cart = repr.to_cartesian(mu, &params).unwrap();
            assert_abs_diff_eq!(cart.position, reference.position, epsilon = r_tol);
            assert_abs_diff_eq!(cart.velocity, reference.velocity, epsilon = v_tol);
        }
    }

    #[test]
    fn equinoctial_is_returned_as_is_when_factor_matches() {
        let mu = 398_600.0;
        let params = KeplerParams::default();
        let eq = sample_classical().to_equinoctial(None).unwrap();
        let repr = Representation::Equinoctial(eq);
        assert_eq!(repr.to_equinoctial(mu, None, &params).unwrap(), eq);

        let flipped = repr
            .to_equinoctial(mu, Some(RetrogradeFactor::Retrograde), &params)
            .unwrap();
        assert_eq!(flipped.retrograde, RetrogradeFactor::Retrograde);
    }

    #[test]
    fn accessors_and_display() {
        let c = CartesianState::new(Vector3::new(7000.0, 0.0, 0.0), Vector3::new(0.0, 7.5, 0.0));
        let repr: Representation = c.into();
        assert!(repr.as_cartesian().is_some());
        assert!(repr.as_classical().is_none());
        assert!(repr.to_string().starts_with("[Cartesian representation]"));
    }
}
