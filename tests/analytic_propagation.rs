mod common;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::Vector3;
use orbitkit::kepler::KeplerParams;
use orbitkit::orbit_state::OrbitState;
use orbitkit::orbit_type::classical_element::ClassicalElements;
use orbitkit::propagation::analytic::propagate;
use orbitkit::propagation::KeplerMethod;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{assert_states_close, epoch, gcrf, random_position, state, MU};

const METHODS: [KeplerMethod; 2] = [KeplerMethod::MeanAnomaly, KeplerMethod::UniversalVariable];

#[test]
fn test_quarter_period_circular_orbit() {
    let mu = 398_600.0;
    let s = OrbitState::from_vectors(
        mu,
        epoch(),
        gcrf(),
        Vector3::new(7000.0, 0.0, 0.0),
        Vector3::new(0.0, 7.546, 0.0),
    )
    .unwrap();
    let quarter = 0.25 * std::f64::consts::TAU * (7000.0_f64.powi(3) / mu).sqrt();

    for method in METHODS {
        let out = propagate(&s, quarter, method, &KeplerParams::default()).unwrap();
        let (r, _) = out.rv().unwrap();
        assert!((r - Vector3::new(0.0, 7000.0, 0.0)).norm() < 1.0, "{method:?}: {r:?}");
    }
}

#[test]
fn test_forward_backward_reversibility() {
    let mut rng = StdRng::seed_from_u64(42_u64);
    for _ in 0..100 {
        let r = random_position(&mut rng, 6800.0, 40_000.0);
        let v_circ = (MU / r.norm()).sqrt();
        let dir = r.cross(&Vector3::z()).normalize();
        let v = rng.random_range(0.6..1.6) * v_circ * (dir + 0.2 * r.normalize()).normalize();
        let s = state(r, v);
        let dt = rng.random_range(-20_000.0..20_000.0);

        for method in METHODS {
            let there = propagate(&s, dt, method, &KeplerParams::default()).unwrap();
            let back = propagate(&there, -dt, method, &KeplerParams::default()).unwrap();
            assert_states_close(&back, &s, 1e-8);
            assert_eq!(back.epoch(), s.epoch());
        }
    }
}

#[test]
fn test_outbound_hyperbola_round_trip() {
    let s = state(
        Vector3::new(10604.58, -8944.28, 15600.16),
        Vector3::new(-3.419, -5.352, 0.941),
    );
    let (r, v) = s.rv().unwrap();
    assert!(r.dot(&v) > 0.0);
    assert!(s.specific_energy().unwrap() > 0.0);

    for dt in [5955.66, -5955.66, 40_000.0] {
        let universal = propagate(&s, dt, KeplerMethod::UniversalVariable, &KeplerParams::default())
            .unwrap();
        let mean = propagate(&s, dt, KeplerMethod::MeanAnomaly, &KeplerParams::default()).unwrap();
        assert_states_close(&universal, &mean, 1e-9);

        let back = propagate(
            &universal,
            -dt,
            KeplerMethod::UniversalVariable,
            &KeplerParams::default(),
        )
        .unwrap();
        assert_states_close(&back, &s, 1e-8);
    }
}

#[test]
fn test_energy_and_momentum_are_conserved() {
    let coe = ClassicalElements::from_semi_latus_rectum(15_000.0, 0.6, 1.1, 0.4, 2.0, 0.1).unwrap();
    let s = OrbitState::from_classical(MU, epoch(), gcrf(), coe).unwrap();
    let energy = s.specific_energy().unwrap();
    let h = s.angular_momentum().unwrap();

    for dt in [600.0, 7_200.0, 86_400.0, -43_200.0] {
        let out = s.propagate(dt).unwrap();
        assert_relative_eq!(out.specific_energy().unwrap(), energy, max_relative = 1e-10);
        assert_relative_eq!(out.angular_momentum().unwrap(), h, max_relative = 1e-10);
    }
}

#[test]
fn test_hyperbolic_flyby_is_symmetric() {
    // periapsis at ν = 0, so ±dt land on mirror images
    let coe = ClassicalElements::from_semi_latus_rectum(20_000.0, 1.8, 0.0, 0.0, 0.0, 0.0).unwrap();
    let s = OrbitState::from_classical(MU, epoch(), gcrf(), coe).unwrap();
    let (ra, _) = s.propagate(3_000.0).unwrap().rv().unwrap();
    let (rb, _) = s.propagate(-3_000.0).unwrap().rv().unwrap();
    assert_abs_diff_eq!(ra.x, rb.x, epsilon = 1e-6);
    assert_abs_diff_eq!(ra.y, -rb.y, epsilon = 1e-6);
}
