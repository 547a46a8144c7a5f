#![allow(dead_code)]

use hifitime::Epoch;
use nalgebra::Vector3;
use orbitkit::orbit_state::{Frame, OrbitState};
use rand::rngs::StdRng;
use rand::Rng;

pub const MU: f64 = 398_600.441_8;

pub fn epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2025, 3, 20)
}

pub fn gcrf() -> Frame {
    Frame::new("GCRF")
}

pub fn state(r: Vector3<f64>, v: Vector3<f64>) -> OrbitState {
    OrbitState::from_vectors(MU, epoch(), gcrf(), r, v).unwrap()
}

/// `‖actual − expected‖ ≤ max_relative · ‖expected‖`
pub fn assert_vec_close(actual: &Vector3<f64>, expected: &Vector3<f64>, max_relative: f64) {
    let err = (actual - expected).norm();
    assert!(
        err <= max_relative * expected.norm(),
        "vectors differ by {err:.3e} (relative {:.3e}):\n  actual   {actual:?}\n  expected {expected:?}",
        err / expected.norm()
    );
}

pub fn assert_states_close(actual: &OrbitState, expected: &OrbitState, max_relative: f64) {
    let (ra, va) = actual.rv().unwrap();
    let (re, ve) = expected.rv().unwrap();
    assert_vec_close(&ra, &re, max_relative);
    assert_vec_close(&va, &ve, max_relative);
}

/// Random position with radius in `[r_min, r_max]`, mostly near the equator.
pub fn random_position(rng: &mut StdRng, r_min: f64, r_max: f64) -> Vector3<f64> {
    let radius = rng.random_range(r_min..r_max);
    let lon = rng.random_range(0.0..std::f64::consts::TAU);
    let lat = rng.random_range(-1.0..1.0_f64);
    radius * Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}
