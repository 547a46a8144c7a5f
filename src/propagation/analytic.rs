//! # Analytic two-body propagation
//!
//! Closed-form propagation of an [`OrbitState`] by a signed time offset.
//!
//! ## Methods
//!
//! * [`KeplerMethod::MeanAnomaly`] – convert to classical elements, advance
//!   the mean anomaly by `n·Δt` and solve the regime's Kepler equation
//!   (elliptic, hyperbolic, or Barker's equation for the parabola).
//! * [`KeplerMethod::UniversalVariable`] – solve the universal Kepler
//!   equation for χ and build the Lagrange coefficients
//!
//! ```text
//! f = 1 − χ²·c2/r0          g = Δt − χ³·c3/√μ
//! ḟ = √μ/(r·r0)·χ(ψ·c3 − 1)  ġ = 1 − χ²·c2/r
//! r = f·r0 + g·v0           v = ḟ·r0 + ġ·v0
//! ```
//!
//! The universal method does not branch on the conic and stays accurate near
//! `e = 1`, which is why it is the default.
//!
//! Both methods return a **Cartesian** state at `epoch + Δt`, with the same
//! `μ` and frame as the input.

use hifitime::Duration;
use tracing::debug;

use crate::{
    kepler::{mean_to_true_anomaly, solve_universal_kepler, KeplerParams},
    orbit_errors::OrbitError,
    orbit_state::OrbitState,
    orbit_type::{cartesian::CartesianState, classical_element::SemiMajorAxis},
    propagation::KeplerMethod,
};

/// Propagate a state by `dt` seconds under pure two-body dynamics.
///
/// Arguments
/// ---------
/// * `state`: initial state, any representation.
/// * `dt`: signed time offset in seconds (time unit of `μ`).
/// * `method`: [`KeplerMethod`] to use.
/// * `params`: Kepler solver tolerance and iteration budget.
///
/// Return
/// ------
/// * A new Cartesian [`OrbitState`] at `state.epoch() + dt`.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidArgument`] if `dt` is not finite.
/// * [`OrbitError::DegenerateGeometry`] for a rectilinear orbit with
///   [`KeplerMethod::MeanAnomaly`].
/// * [`OrbitError::Convergence`] if the Kepler solver fails.
///
/// See also
/// --------
/// * [`OrbitState::propagate`] – default-method shortcut.
/// * [`propagate_many`] – batch version.
pub fn propagate(
    state: &OrbitState,
    dt: f64,
    method: KeplerMethod,
    params: &KeplerParams,
) -> Result<OrbitState, OrbitError> {
    if !dt.is_finite() {
        return Err(OrbitError::InvalidArgument(format!(
            "time offset must be finite, got {dt}"
        )));
    }

    let mu = state.mu();
    let target = match method {
        KeplerMethod::MeanAnomaly => propagate_mean_anomaly(state, dt, params)?,
        KeplerMethod::UniversalVariable => {
            let initial = state.representation().to_cartesian(mu, params)?;
            propagate_universal(&initial, dt, mu, params)?
        }
    };

    debug!(?method, dt, "two-body propagation done");

    OrbitState::new(
        mu,
        state.epoch() + Duration::from_seconds(dt),
        state.frame().clone(),
        target,
    )
}

fn propagate_mean_anomaly(
    state: &OrbitState,
    dt: f64,
    params: &KeplerParams,
) -> Result<CartesianState, OrbitError> {
    let mu = state.mu();
    let coe = state.representation().to_classical(mu, params)?;

    let mean_motion = match coe.semi_major_axis {
        SemiMajorAxis::Finite(a) => (mu / a.abs().powi(3)).sqrt(),
        SemiMajorAxis::Parabolic { .. } => 2.0 * (mu / coe.semi_latus_rectum().powi(3)).sqrt(),
    };

    let mean_anomaly = coe.mean_anomaly()? + mean_motion * dt;
    let true_anomaly = mean_to_true_anomaly(mean_anomaly, coe.eccentricity, params)?;

    coe.with_true_anomaly(true_anomaly).to_cartesian(mu)
}

/// Universal-variable propagation of Cartesian vectors.
pub(crate) fn propagate_universal(
    initial: &CartesianState,
    dt: f64,
    mu: f64,
    params: &KeplerParams,
) -> Result<CartesianState, OrbitError> {
    let r0 = &initial.position;
    let v0 = &initial.velocity;
    let r0_norm = r0.norm();
    let sqrt_mu = mu.sqrt();

    let sol = solve_universal_kepler(r0, v0, dt, mu, params)?;
    let chi2 = sol.chi * sol.chi;

    let f = 1.0 - chi2 * sol.c2 / r0_norm;
    let g = dt - chi2 * sol.chi * sol.c3 / sqrt_mu;
    let position = f * r0 + g * v0;

    let r_norm = position.norm();
    let f_dot = sqrt_mu / (r_norm * r0_norm) * sol.chi * (sol.psi * sol.c3 - 1.0);
    let g_dot = 1.0 - chi2 * sol.c2 / r_norm;
    let velocity = f_dot * r0 + g_dot * v0;

    Ok(CartesianState::new(position, velocity))
}

/// Propagate many states by the same offset.
///
/// With the `parallel` feature the states are processed on the rayon thread
/// pool; results keep the input order either way.
pub fn propagate_many(
    states: &[OrbitState],
    dt: f64,
    method: KeplerMethod,
    params: &KeplerParams,
) -> Vec<Result<OrbitState, OrbitError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        states
            .par_iter()
            .map(|s| propagate(s, dt, method, params))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        states
            .iter()
            .map(|s| propagate(s, dt, method, params))
            .collect()
    }
}

#[cfg(test)]
mod analytic_test {
    use super::*;
    use crate::{
        constants::{DPI, MU_EARTH, RADEG},
        orbit_state::Frame,
        orbit_type::classical_element::ClassicalElements,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use hifitime::Epoch;
    use nalgebra::Vector3;

    fn epoch() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2025, 6, 1)
    }

    fn state_from(mu: f64, r: Vector3<f64>, v: Vector3<f64>) -> OrbitState {
        OrbitState::from_vectors(mu, epoch(), Frame::new("GCRF"), r, v).unwrap()
    }

    #[test]
    fn test_vallado_example_2_4() {
        // Vallado, Fundamentals of Astrodynamics, example 2-4
        let s = state_from(
            MU_EARTH,
            Vector3::new(1131.340, -2282.343, 6672.423),
            Vector3::new(-5.64305, 4.30333, 2.42879),
        );
        let expected_r = Vector3::new(-4219.7527, 4363.0292, -3958.7666);
        let expected_v = Vector3::new(3.689866, -1.916735, -6.112511);

        for method in [KeplerMethod::MeanAnomaly, KeplerMethod::UniversalVariable] {
            let out = propagate(&s, 40.0 * 60.0, method, &KeplerParams::default()).unwrap();
            let (r, v) = out.rv().unwrap();
            assert_abs_diff_eq!(r, expected_r, epsilon = 1e-2);
            assert_abs_diff_eq!(v, expected_v, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_epoch_and_frame_are_carried() {
        let s = state_from(
            398_600.0,
            Vector3::new(7000.0, 0.0, 0.0),
            Vector3::new(0.0, 7.546, 0.0),
        );
        let out = s.propagate(90.0).unwrap();
        assert_eq!(out.epoch(), epoch() + Duration::from_seconds(90.0));
        assert_eq!(out.frame(), s.frame());
        assert!(out.representation().as_cartesian().is_some());
    }

    #[test]
    fn test_methods_agree_on_regular_orbits() {
        let params = KeplerParams::default();
        let coes = [
            ClassicalElements::from_semi_latus_rectum(9000.0, 0.1, 0.5, 0.2, 0.3, 0.4).unwrap(),
            ClassicalElements::from_semi_latus_rectum(20000.0, 0.7, 1.2, 2.0, 1.0, 3.0).unwrap(),
            ClassicalElements::from_semi_latus_rectum(15000.0, 2.0, 0.4, 1.0, 0.2, -0.5).unwrap(),
        ];
        for coe in coes {
            let s = OrbitState::from_classical(MU_EARTH, epoch(), Frame::new("GCRF"), coe).unwrap();
            for dt in [-3000.0, 600.0, 5400.0] {
                let a = propagate(&s, dt, KeplerMethod::MeanAnomaly, &params).unwrap();
                let b = propagate(&s, dt, KeplerMethod::UniversalVariable, &params).unwrap();
                let (ra, va) = a.rv().unwrap();
                let (rb, vb) = b.rv().unwrap();
                assert_relative_eq!(ra, rb, max_relative = 1e-8);
                assert_relative_eq!(va, vb, max_relative = 1e-8);
            }
        }
    }

    #[test]
    fn test_period_closure() {
        let coe =
            ClassicalElements::from_semi_latus_rectum(11067.790, 0.83285, 87.87 * RADEG, 227.89 * RADEG, 53.38 * RADEG, 92.335 * RADEG)
                .unwrap();
        let s = OrbitState::from_classical(MU_EARTH, epoch(), Frame::new("GCRF"), coe).unwrap();
        let period = s.period().unwrap();
        let (r0, v0) = s.rv().unwrap();

        for method in [KeplerMethod::MeanAnomaly, KeplerMethod::UniversalVariable] {
            let out = propagate(&s, period, method, &KeplerParams::default()).unwrap();
            let (r, v) = out.rv().unwrap();
            assert_relative_eq!(r, r0, max_relative = 1e-8);
            assert_relative_eq!(v, v0, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_parabolic_mean_anomaly_matches_universal() {
        let params = KeplerParams::default();
        let coe = ClassicalElements::from_semi_latus_rectum(14000.0, 1.0, 0.3, 0.1, 0.2, -1.0).unwrap();
        let s = OrbitState::from_classical(MU_EARTH, epoch(), Frame::new("GCRF"), coe).unwrap();
        let a = propagate(&s, 3600.0, KeplerMethod::MeanAnomaly, &params).unwrap();
        let b = propagate(&s, 3600.0, KeplerMethod::UniversalVariable, &params).unwrap();
        let (ra, _) = a.rv().unwrap();
        let (rb, _) = b.rv().unwrap();
        assert_relative_eq!(ra, rb, max_relative = 1e-7);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let s = state_from(
            MU_EARTH,
            Vector3::new(7000.0, 100.0, -50.0),
            Vector3::new(0.1, 7.4, 1.0),
        );
        let out = s.propagate(0.0).unwrap();
        let (r, v) = out.rv().unwrap();
        assert_eq!(r, Vector3::new(7000.0, 100.0, -50.0));
        assert_eq!(v, Vector3::new(0.1, 7.4, 1.0));
    }

    #[test]
    fn test_non_finite_offset_is_rejected() {
        let s = state_from(
            MU_EARTH,
            Vector3::new(7000.0, 0.0, 0.0),
            Vector3::new(0.0, 7.5, 0.0),
        );
        assert!(matches!(s.propagate(f64::NAN), Err(OrbitError::InvalidArgument(_))));
    }

    #[test]
    fn test_propagate_many_keeps_order() {
        let states: Vec<_> = (1..=4)
            .map(|i| {
                let r = 7000.0 + 500.0 * i as f64;
                state_from(
                    MU_EARTH,
                    Vector3::new(r, 0.0, 0.0),
                    Vector3::new(0.0, (MU_EARTH / r).sqrt(), 0.0),
                )
            })
            .collect();
        let out = propagate_many(&states, DPI, KeplerMethod::default(), &KeplerParams::default());
        assert_eq!(out.len(), 4);
        for (s, o) in states.iter().zip(out) {
            let o = o.unwrap();
            let r0 = s.rv().unwrap().0.norm();
            assert_relative_eq!(o.rv().unwrap().0.norm(), r0, max_relative = 1e-10);
        }
    }
}
