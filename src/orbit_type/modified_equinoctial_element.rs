use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    constants::PARABOLIC_TOLERANCE,
    kepler::principal_angle,
    orbit_errors::OrbitError,
    orbit_type::{
        cartesian::CartesianState,
        classical_element::{classical_orientation, ClassicalElements},
        equinoctial_element::equinoctial_frame,
        RetrogradeFactor,
    },
};

/// Modified equinoctial orbital elements.
///
/// Same slow variables as [`crate::orbit_type::equinoctial_element::EquinoctialElements`],
/// with the true longitude `L = ω + I·Ω + ν` as fast variable. No Kepler
/// equation is involved in either direction, and the set is valid for every
/// conic with `p > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModifiedEquinoctialElements {
    pub semi_latus_rectum: f64,
    pub eccentricity_cos_lon: f64,
    pub eccentricity_sin_lon: f64,
    pub tan_half_incl_cos_node: f64,
    pub tan_half_incl_sin_node: f64,
    pub true_longitude: f64,
    pub retrograde: RetrogradeFactor,
}

impl ModifiedEquinoctialElements {
    /// Check that every component is finite, that `p > 0`, and that the
    /// true longitude lies inside the asymptotes of an open orbit.
    pub fn validate(&self) -> Result<(), OrbitError> {
        let p = self.semi_latus_rectum;
        if !(p.is_finite() && p > 0.0) {
            return Err(OrbitError::InvalidElements(format!(
                "semi-latus rectum must be > 0, got {p}"
            )));
        }
        let rest = [
            self.eccentricity_cos_lon,
            self.eccentricity_sin_lon,
            self.tan_half_incl_cos_node,
            self.tan_half_incl_sin_node,
            self.true_longitude,
        ];
        if rest.iter().any(|x| !x.is_finite()) {
            return Err(OrbitError::InvalidElements(
                "modified equinoctial elements must be finite".into(),
            ));
        }
        if self.radius_denominator() <= 0.0 {
            return Err(OrbitError::InvalidElements(format!(
                "true longitude {} is beyond the asymptotes",
                self.true_longitude
            )));
        }
        Ok(())
    }

    /// `w = 1 + f·cos L + g·sin L`, so that `r = p / w`.
    fn radius_denominator(&self) -> f64 {
        let (sin_l, cos_l) = self.true_longitude.sin_cos();
        1.0 + self.eccentricity_cos_lon * cos_l + self.eccentricity_sin_lon * sin_l
    }

    /// Convert to Cartesian vectors in closed form.
    ///
    /// ```text
    /// r = p / w · (cos L · f̂ + sin L · ĝ)
    /// v = √(μ/p) · (−(g + sin L) · f̂ + (f + cos L) · ĝ)
    /// ```
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

        let p = self.semi_latus_rectum;
        let f = self.eccentricity_cos_lon;
        let g = self.eccentricity_sin_lon;
        let (sin_l, cos_l) = self.true_longitude.sin_cos();

        let (f_vector, g_vector) = equinoctial_frame(
            self.tan_half_incl_cos_node,
            self.tan_half_incl_sin_node,
            self.retrograde,
        );

        let r = p / self.radius_denominator();
        let position = r * (cos_l * f_vector + sin_l * g_vector);

        let sqrt_mu_p = (mu / p).sqrt();
        let velocity = sqrt_mu_p * (-(g + sin_l) * f_vector + (f + cos_l) * g_vector);

        Ok(CartesianState::new(position, velocity))
    }

    /// Convert to classical elements, `ν = L − ϖ`.
    pub fn to_classical(&self) -> Result<ClassicalElements, OrbitError> {
        self.validate()?;

        let o = classical_orientation(
            self.eccentricity_cos_lon,
            self.eccentricity_sin_lon,
            self.tan_half_incl_cos_node,
            self.tan_half_incl_sin_node,
            self.retrograde,
        );

        let ecc = if (o.eccentricity - 1.0).abs() <= PARABOLIC_TOLERANCE {
            1.0
        } else {
            o.eccentricity
        };

        let coe = ClassicalElements::from_semi_latus_rectum(
            self.semi_latus_rectum,
            ecc,
            o.inclination,
            o.raan,
            o.argp,
            0.0,
        )?;
        Ok(coe.with_true_anomaly(principal_angle(self.true_longitude - o.lon_periapsis)))
    }
}

impl fmt::Display for ModifiedEquinoctialElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Modified Equinoctial Elements ({:?})", self.retrograde)?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "  p   (semi-latus rectum)     = {:.6}", self.semi_latus_rectum)?;
        writeln!(f, "  f   (e cos ϖ)               = {:.9}", self.eccentricity_cos_lon)?;
        writeln!(f, "  g   (e sin ϖ)               = {:.9}", self.eccentricity_sin_lon)?;
        writeln!(f, "  h   (tan(i/2) cos Ω)        = {:.9}", self.tan_half_incl_cos_node)?;
        writeln!(f, "  k   (tan(i/2) sin Ω)        = {:.9}", self.tan_half_incl_sin_node)?;
        write!(
            f,
            "  L   (true longitude)        = {:.6} rad ({:.6}°)",
            self.true_longitude,
            self.true_longitude.to_degrees()
        )
    }
}

#[cfg(test)]
mod modified_equinoctial_element_test {
    use super::*;
    use crate::constants::MU_EARTH;
    use crate::orbit_type::classical_element::SemiMajorAxis;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    #[test]
    fn test_rv_mee_round_trip_retrograde() {
        let coe = ClassicalElements::from_semi_latus_rectum(9000.0, 0.2, 2.6, 1.1, 0.7, 0.4).unwrap();
        assert!(coe.inclination > PI / 2.0);
        let state = coe.to_cartesian(MU_EARTH).unwrap();

        let mee = coe.to_modified_equinoctial(None).unwrap();
        assert_eq!(mee.retrograde, RetrogradeFactor::Retrograde);

        let back = mee.to_cartesian(MU_EARTH).unwrap();
        let position_error = (back.position - state.position).norm();
        let velocity_error = (back.velocity - state.velocity).norm();
        assert!(position_error <= 1e-12 * state.position.norm(), "{position_error:e}");
        assert!(velocity_error <= 1e-12 * state.velocity.norm(), "{velocity_error:e}");

        let round = back.to_classical(MU_EARTH).unwrap();
        assert_relative_eq!(round.inclination, coe.inclination, max_relative = 1e-12);
    }

    #[test]
    fn test_circular_equatorial_is_regular() {
        let mu = 398_600.0;
        let mee = ModifiedEquinoctialElements {
            semi_latus_rectum: 7000.0,
            eccentricity_cos_lon: 0.0,
            eccentricity_sin_lon: 0.0,
            tan_half_incl_cos_node: 0.0,
            tan_half_incl_sin_node: 0.0,
            true_longitude: PI / 2.0,
            retrograde: RetrogradeFactor::Direct,
        };
        let state = mee.to_cartesian(mu).unwrap();
        assert_abs_diff_eq!(state.position, Vector3::new(0.0, 7000.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(state.velocity.norm(), (mu / 7000.0_f64).sqrt(), max_relative = 1e-14);
        assert!(state.velocity.x < 0.0);

        let coe = mee.to_classical().unwrap();
        assert_eq!(coe.eccentricity, 0.0);
        assert_eq!(coe.periapsis_argument, 0.0);
        assert_abs_diff_eq!(coe.true_anomaly, PI / 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_parabolic_mee() {
        let coe = ClassicalElements::from_semi_latus_rectum(9000.0, 1.0, 0.4, 0.2, 0.1, 1.0).unwrap();
        let mee = coe.to_modified_equinoctial(None).unwrap();
        let back = mee.to_classical().unwrap();
        assert!(matches!(back.semi_major_axis, SemiMajorAxis::Parabolic { .. }));
        assert_abs_diff_eq!(back.true_anomaly, 1.0, epsilon = 1e-12);

        let direct = mee.to_cartesian(MU_EARTH).unwrap();
        let reference = coe.to_cartesian(MU_EARTH).unwrap();
        assert_abs_diff_eq!(direct.position, reference.position, epsilon = 1e-8);
        assert_abs_diff_eq!(direct.velocity, reference.velocity, epsilon = 1e-11);
    }

    #[test]
    fn test_beyond_asymptote_is_rejected() {
        let mee = ModifiedEquinoctialElements {
            semi_latus_rectum: 7000.0,
            eccentricity_cos_lon: 2.0,
            eccentricity_sin_lon: 0.0,
            tan_half_incl_cos_node: 0.1,
            tan_half_incl_sin_node: 0.0,
            true_longitude: PI,
            retrograde: RetrogradeFactor::Direct,
        };
        assert!(matches!(
            mee.to_cartesian(MU_EARTH),
            Err(OrbitError::InvalidElements(_))
        ));
    }
}
