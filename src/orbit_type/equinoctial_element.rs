use std::{f64::consts::PI, fmt};

use nalgebra::Vector3;
use roots::{find_root_newton_raphson, SimpleConvergency};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DPI, PARABOLIC_TOLERANCE},
    kepler::{mean_to_true_anomaly, principal_angle, KeplerParams, OrbitRegime},
    orbit_errors::OrbitError,
    orbit_type::{
        cartesian::CartesianState,
        classical_element::{classical_orientation, ClassicalElements},
        RetrogradeFactor,
    },
};

/// Equinoctial orbital elements.
///
/// Units
/// -----
/// * `semi_latus_rectum`: length unit of the caller
/// * `eccentricity_cos_lon`, `eccentricity_sin_lon`: dimensionless, `f = e·cos ϖ`, `g = e·sin ϖ`
/// * `tan_half_incl_cos_node`, `tan_half_incl_sin_node`: dimensionless,
///   `h = tan(i/2)^I·cos Ω`, `k = tan(i/2)^I·sin Ω`
/// * `mean_longitude`: radians, `λ = ϖ + M`
///
/// with `ϖ = ω + I·Ω` and `I` the [`RetrogradeFactor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquinoctialElements {
    pub semi_latus_rectum: f64,      // p = a(1 - e²)
    pub eccentricity_cos_lon: f64,   // f = e cos(ω + IΩ)
    pub eccentricity_sin_lon: f64,   // g = e sin(ω + IΩ)
    pub tan_half_incl_cos_node: f64, // h = tan(i/2)^I cos(Ω)
    pub tan_half_incl_sin_node: f64, // k = tan(i/2)^I sin(Ω)
    pub mean_longitude: f64,         // λ = ω + IΩ + M
    pub retrograde: RetrogradeFactor,
}

/// Unit vectors `(f̂, ĝ)` of the equinoctial frame.
///
/// `f̂` points towards `ϖ = 0` in the orbital plane, `ĝ` completes the
/// right-handed pair with the angular momentum (direct) or against it
/// (retrograde).
pub(crate) fn equinoctial_frame(
    h: f64,
    k: f64,
    retrograde: RetrogradeFactor,
) -> (Vector3<f64>, Vector3<f64>) {
    let i_fac = retrograde.value();
    let inv_s2 = 1.0 / (1.0 + h * h + k * k);
    let hk2 = 2.0 * h * k;

    let f_vector = Vector3::new(1.0 - k * k + h * h, hk2, -2.0 * i_fac * k) * inv_s2;
    let g_vector = Vector3::new(i_fac * hk2, i_fac * (1.0 + k * k - h * h), 2.0 * h) * inv_s2;

    (f_vector, g_vector)
}

impl EquinoctialElements {
    fn eccentricity_squared(&self) -> f64 {
        self.eccentricity_cos_lon.powi(2) + self.eccentricity_sin_lon.powi(2)
    }

    /// Eccentricity `e = √(f² + g²)`.
    pub fn eccentricity(&self) -> f64 {
        self.eccentricity_squared().sqrt()
    }

    /// Check that every component is finite and that `p > 0`.
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
            self.mean_longitude,
        ];
        if rest.iter().any(|x| !x.is_finite()) {
            return Err(OrbitError::InvalidElements(
                "equinoctial elements must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Solve the equinoctial Kepler equation `K − f·sin K + g·cos K = λ`
    /// for the eccentric longitude `K`.
    ///
    /// Arguments
    /// ---------
    /// * `mean_longitude`: λ, already shifted into `[ϖ, ϖ + 2π)`.
    /// * `longitude_of_periapsis`: ϖ, used for the starting point `π + ϖ`.
    /// * `params`: tolerance and iteration budget.
    fn solve_kepler_equation(
        &self,
        mean_longitude: f64,
        longitude_of_periapsis: f64,
        params: &KeplerParams,
    ) -> Result<f64, OrbitError> {
        let f = |k: f64| -> f64 {
            k - self.eccentricity_cos_lon * k.sin() + self.eccentricity_sin_lon * k.cos()
                - mean_longitude
        };
        let df = |k: f64| -> f64 {
            1.0 - self.eccentricity_cos_lon * k.cos() - self.eccentricity_sin_lon * k.sin()
        };

        let x0 = PI + longitude_of_periapsis;

        let mut tol = SimpleConvergency {
            eps: params.tolerance,
            max_iter: params.max_iter,
        };

        find_root_newton_raphson(x0, &f, &df, &mut tol).map_err(|err| {
            OrbitError::from_search(err, "equinoctial Kepler solver", params.max_iter)
        })
    }

    fn compute_cartesian_position_and_velocity(
        &self,
        semi_major_axis: f64,
        mean_motion: f64,
        eccentric_longitude: f64,
        eccentricity_pow2: f64,
    ) -> CartesianState {
        let f = self.eccentricity_cos_lon;
        let g = self.eccentricity_sin_lon;
        let a = semi_major_axis;

        let beta = 1. / (1. + (1. - eccentricity_pow2).sqrt());
        let beta_ecc_term = beta * f * g;

        let (sin_k, cos_k) = eccentric_longitude.sin_cos();

        let xe = a * ((1. - beta * g.powi(2)) * cos_k + beta_ecc_term * sin_k - f);
        let ye = a * ((1. - beta * f.powi(2)) * sin_k + beta_ecc_term * cos_k - g);

        let (f_vector, g_vector) = equinoctial_frame(
            self.tan_half_incl_cos_node,
            self.tan_half_incl_sin_node,
            self.retrograde,
        );

        let position = xe * f_vector + ye * g_vector;

        let v_const = mean_motion * a.powi(2) / (xe.powi(2) + ye.powi(2)).sqrt();
        let v_xe = v_const * (beta_ecc_term * cos_k - (1. - beta * g.powi(2)) * sin_k);
        let v_ye = v_const * ((1. - beta * f.powi(2)) * cos_k - beta_ecc_term * sin_k);
        let velocity = v_xe * f_vector + v_ye * g_vector;

        CartesianState::new(position, velocity)
    }

    /// Convert to Cartesian vectors.
    ///
    /// Elliptic orbits are handled directly through the eccentric longitude,
    /// which stays regular for circular and equatorial orbits. Open orbits go
    /// through [`ClassicalElements`].
    ///
    /// Arguments
    /// ---------
    /// * `mu`: gravitational parameter.
    /// * `params`: Kepler solver settings.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `mu ≤ 0`.
    /// * [`OrbitError::InvalidElements`] for an invalid set.
    /// * [`OrbitError::Convergence`] if the Kepler solve fails.
    pub fn to_cartesian(
        &self,
        mu: f64,
        params: &KeplerParams,
    ) -> Result<CartesianState, OrbitError> {
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "gravitational parameter must be > 0, got {mu}"
            )));
        }
        self.validate()?;

        let eccentricity_pow2 = self.eccentricity_squared();
        let regime =
            OrbitRegime::from_eccentricity(eccentricity_pow2.sqrt(), params.parabolic_tolerance)?;
        if regime != OrbitRegime::Elliptic {
            return self.to_classical(params)?.to_cartesian(mu);
        }

        let semi_major_axis = self.semi_latus_rectum / (1.0 - eccentricity_pow2);
        let mean_motion = (mu / semi_major_axis.powi(3)).sqrt();

        let longitude_of_periapsis = if eccentricity_pow2 > f64::EPSILON * 1e2 {
            principal_angle(self.eccentricity_sin_lon.atan2(self.eccentricity_cos_lon))
        } else {
            0.0
        };

        let mut mean_longitude = principal_angle(self.mean_longitude);
        if mean_longitude < longitude_of_periapsis {
            mean_longitude += DPI;
        }

        let eccentric_longitude =
            self.solve_kepler_equation(mean_longitude, longitude_of_periapsis, params)?;

        Ok(self.compute_cartesian_position_and_velocity(
            semi_major_axis,
            mean_motion,
            eccentric_longitude,
            eccentricity_pow2,
        ))
    }

    /// Convert to classical elements.
    ///
    /// The mean anomaly `M = λ − ϖ` is turned into a true anomaly with the
    /// regime's Kepler solver.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] for an invalid set.
    /// * [`OrbitError::Convergence`] if the Kepler solve fails.
    pub fn to_classical(&self, params: &KeplerParams) -> Result<ClassicalElements, OrbitError> {
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
        let mean_anomaly = self.mean_longitude - o.lon_periapsis;
        let true_anomaly = mean_to_true_anomaly(mean_anomaly, ecc, params)?;

        ClassicalElements::from_semi_latus_rectum(
            self.semi_latus_rectum,
            ecc,
            o.inclination,
            o.raan,
            o.argp,
            true_anomaly,
        )
    }
}

impl fmt::Display for EquinoctialElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Equinoctial Elements ({:?})", self.retrograde)?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "  p   (semi-latus rectum)     = {:.6}", self.semi_latus_rectum)?;
        writeln!(f, "  f   (e cos ϖ)               = {:.9}", self.eccentricity_cos_lon)?;
        writeln!(f, "  g   (e sin ϖ)               = {:.9}", self.eccentricity_sin_lon)?;
        writeln!(f, "  h   (tan(i/2) cos Ω)        = {:.9}", self.tan_half_incl_cos_node)?;
        writeln!(f, "  k   (tan(i/2) sin Ω)        = {:.9}", self.tan_half_incl_sin_node)?;
        write!(
            f,
            "  λ   (mean longitude)        = {:.6} rad ({:.6}°)",
            self.mean_longitude,
            self.mean_longitude.to_degrees()
        )
    }
}

#[cfg(test)]
mod equinoctial_element_test {
    use super::*;
    use crate::orbit_type::classical_element::SemiMajorAxis;
    use crate::orbit_type::orbit_type_test::assert_angle_eq;
    use approx::assert_abs_diff_eq;

    const GAUSS_GRAV_SQUARED: f64 = 0.01720209895 * 0.01720209895;

    fn sample(a: f64, mean_longitude: f64) -> EquinoctialElements {
        let f = 8.8564152600135601E-002;
        let g = 0.26937368090922720;
        EquinoctialElements {
            semi_latus_rectum: a * (1.0 - f * f - g * g),
            eccentricity_cos_lon: f,
            eccentricity_sin_lon: g,
            tan_half_incl_cos_node: 0.10168201109730375,
            tan_half_incl_sin_node: 8.0899701663963020E-004,
            mean_longitude,
            retrograde: RetrogradeFactor::Direct,
        }
    }

    #[test]
    fn test_equinoctial_to_classical() {
        let equ = EquinoctialElements {
            semi_latus_rectum: 1.8017360713 * (1.0 - 0.2835591457_f64.powi(2)),
            eccentricity_cos_lon: 0.08856415260522467,
            eccentricity_sin_lon: 0.2693736809404963,
            tan_half_incl_cos_node: 0.10168201110394352,
            tan_half_incl_sin_node: 0.0008089970142830734,
            mean_longitude: 1.693697008,
            retrograde: RetrogradeFactor::Direct,
        };
        let coe = equ.to_classical(&KeplerParams::default()).unwrap();

        let SemiMajorAxis::Finite(a) = coe.semi_major_axis else {
            panic!("expected an elliptic orbit");
        };
        assert_abs_diff_eq!(a, 1.8017360713, epsilon = 1e-9);
        assert_abs_diff_eq!(coe.eccentricity, 0.2835591457, epsilon = 1e-9);
        assert_abs_diff_eq!(coe.inclination, 0.2026738329, epsilon = 1e-9);
        assert_abs_diff_eq!(coe.ascending_node_longitude, 0.007955979, epsilon = 1e-9);
        assert_abs_diff_eq!(coe.periapsis_argument, 1.2451951388, epsilon = 1e-9);
        assert_angle_eq(coe.mean_anomaly().unwrap(), 0.4405458902, 1e-9);
    }

    #[test]
    fn test_kepler_equation() {
        let equ = sample(1.8017360713154256, 1.6936970079414786);
        let k = equ
            .solve_kepler_equation(
                1.8432075709935847,
                1.2531511177826073,
                &KeplerParams::default(),
            )
            .unwrap();
        assert_abs_diff_eq!(k, 2.0450042417470673, epsilon = 1e-11);
    }

    #[test]
    fn test_cartesian_after_mean_motion_advance() {
        let a: f64 = 1.8017360713154256;
        let dt = 21.019733018845727;
        let n = (GAUSS_GRAV_SQUARED / a.powi(3)).sqrt();
        let equ = sample(a, 1.6936970079414786 + n * dt);

        let state = equ
            .to_cartesian(GAUSS_GRAV_SQUARED, &KeplerParams::default())
            .unwrap();

        assert_abs_diff_eq!(
            state.position,
            Vector3::new(-0.9321264203108841, 1.0784562905421133, 0.22313456997634373),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            state.velocity,
            Vector3::new(
                -0.013800441828595238,
                -0.007301622877053736,
                -0.001477839051396935
            ),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_direct_and_classical_paths_agree() {
        let mu = 398_600.4418;
        let params = KeplerParams::default();
        for &(ecc, inc) in &[(0.0, 0.0), (0.3, 0.7), (0.9, 1.4), (0.05, 2.8)] {
            let coe = ClassicalElements::new(SemiMajorAxis::Finite(9000.0), ecc, inc, 0.4, 1.1, 2.5)
                .unwrap();
            let equ = coe.to_equinoctial(None).unwrap();
            let direct = equ.to_cartesian(mu, &params).unwrap();
            let reference = coe.to_cartesian(mu).unwrap();
            assert_abs_diff_eq!(direct.position, reference.position, epsilon = 1e-7);
            assert_abs_diff_eq!(direct.velocity, reference.velocity, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_hyperbolic_goes_through_classical() {
        let mu = 398_600.4418;
        let params = KeplerParams::default();
        let coe = ClassicalElements::new(SemiMajorAxis::Finite(-12000.0), 1.4, 0.6, 0.2, 0.3, 0.5)
            .unwrap();
        let equ = coe.to_equinoctial(None).unwrap();
        let back = equ.to_classical(&params).unwrap();
        assert_abs_diff_eq!(back.eccentricity, 1.4, epsilon = 1e-12);
        assert_angle_eq(back.true_anomaly, 0.5, 1e-10);

        let state = equ.to_cartesian(mu, &params).unwrap();
        let reference = coe.to_cartesian(mu).unwrap();
        assert_abs_diff_eq!(state.position, reference.position, epsilon = 1e-7);
    }

    #[test]
    fn test_frame_is_orthonormal_for_both_factors() {
        for retrograde in [RetrogradeFactor::Direct, RetrogradeFactor::Retrograde] {
            let (f, g) = equinoctial_frame(0.3, -0.7, retrograde);
            assert_abs_diff_eq!(f.norm(), 1.0, epsilon = 1e-14);
            assert_abs_diff_eq!(g.norm(), 1.0, epsilon = 1e-14);
            assert_abs_diff_eq!(f.dot(&g), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_invalid_semi_latus_rectum() {
        let mut equ = sample(1.8, 0.0);
        equ.semi_latus_rectum = -1.0;
        assert!(matches!(
            equ.to_cartesian(1.0, &KeplerParams::default()),
            Err(OrbitError::InvalidElements(_))
        ));
    }
}
