mod common;

use approx::assert_relative_eq;
use hifitime::{Duration, Epoch};
use nalgebra::Vector3;
use orbitkit::constants::{MU_EARTH, MU_MOON, RADEG};
use orbitkit::orbit_errors::OrbitError;
use orbitkit::orbit_state::OrbitState;
use orbitkit::orbit_type::cartesian::CartesianState;
use orbitkit::propagation::cowell::{CowellParams, CowellPropagator};
use orbitkit::propagation::force_model::{
    EdelbaumThrust, ExponentialDrag, J2Perturbation, ThirdBody,
};

use crate::common::{assert_states_close, epoch, gcrf, state};

fn leo() -> OrbitState {
    state(Vector3::new(6778.137, 0.0, 0.0), Vector3::new(0.0, 5.9, 4.9))
}

fn tight() -> CowellParams {
    CowellParams::builder().rtol(1e-12).atol(1e-10).build().unwrap()
}

#[test]
fn test_two_body_matches_analytic() {
    let cowell = CowellPropagator::new(tight());
    let s = leo();
    for hours in [1.0, 6.0, -3.0] {
        let target = s.epoch() + Duration::from_seconds(hours * 3600.0);
        let numeric = cowell.propagate_to(&s, target).unwrap();
        let analytic = s.propagate(hours * 3600.0).unwrap();
        assert_eq!(numeric.epoch(), target);
        assert_states_close(&numeric, &analytic, 1e-7);
    }
}

#[test]
fn test_trajectory_samples_match_single_propagations() {
    let cowell = CowellPropagator::default().with_force_model(J2Perturbation::earth());
    let s = leo();
    let epochs: Vec<Epoch> = (1..=12)
        .map(|k| s.epoch() + Duration::from_seconds(600.0 * k as f64))
        .collect();

    let samples = cowell.ephemeris(&s, &epochs).unwrap();
    assert_eq!(samples.len(), epochs.len());

    for (sample, at) in samples.iter().zip(&epochs) {
        assert_eq!(sample.epoch(), *at);
        let single = cowell.propagate_to(&s, *at).unwrap();
        assert_states_close(sample, &single, 1e-7);
    }
}

#[test]
fn test_lazy_trajectory_can_stop_early() {
    let cowell = CowellPropagator::default();
    let s = leo();
    let mut traj = cowell
        .trajectory(&s, (1..).map(|k| s.epoch() + Duration::from_seconds(60.0 * k as f64)))
        .unwrap();

    let first = traj.next().unwrap().unwrap();
    let second = traj.next().unwrap().unwrap();
    assert!(second.epoch() > first.epoch());
    drop(traj);
}

#[test]
fn test_epochs_must_be_monotonic() {
    let cowell = CowellPropagator::default();
    let s = leo();
    let epochs = [
        s.epoch() + Duration::from_seconds(600.0),
        s.epoch() + Duration::from_seconds(300.0),
    ];
    let res = cowell.ephemeris(&s, &epochs);
    assert!(matches!(res, Err(OrbitError::InvalidArgument(_))));
}

#[test]
fn test_energy_conserved_without_perturbations() {
    let cowell = CowellPropagator::new(tight());
    let s = leo();
    let energy = s.specific_energy().unwrap();
    let h = s.angular_momentum().unwrap();
    let period = s.period().unwrap();

    let out = cowell
        .propagate_to(&s, s.epoch() + Duration::from_seconds(10.0 * period))
        .unwrap();
    assert_relative_eq!(out.specific_energy().unwrap(), energy, max_relative = 1e-8);
    assert_relative_eq!(out.angular_momentum().unwrap().norm(), h.norm(), max_relative = 1e-8);
}

#[test]
fn test_contributors_are_summed() {
    let s = leo();
    let target = s.epoch() + Duration::from_seconds(5400.0);

    // lunar third body with the Moon fixed far away along +y
    let moon = ThirdBody::new(MU_MOON, |_: Epoch| Vector3::new(0.0, 384_400.0, 0.0));
    let drag = ExponentialDrag::earth(50.0);

    let full = CowellPropagator::default()
        .with_force_model(J2Perturbation::earth())
        .with_force_model(drag)
        .with_force_model(moon);
    assert_eq!(full.force_model_count(), 3);

    let two_body = CowellPropagator::default().propagate_to(&s, target).unwrap();
    let perturbed = full.propagate_to(&s, target).unwrap();

    let gap = (perturbed.rv().unwrap().0 - two_body.rv().unwrap().0).norm();
    assert!(gap > 1.0, "perturbations should move the satellite, gap = {gap}");
}

#[test]
fn test_closure_force_model() {
    // constant push along +x
    let push = |_: &CartesianState, _: Epoch| Vector3::new(1e-6, 0.0, 0.0);
    let cowell = CowellPropagator::default().with_force_model(push);
    let s = leo();
    let out = cowell
        .propagate_to(&s, s.epoch() + Duration::from_seconds(60.0))
        .unwrap();
    let free = s.propagate(60.0).unwrap();
    let dx = out.rv().unwrap().0.x - free.rv().unwrap().0.x;
    assert_relative_eq!(dx, 0.5 * 1e-6 * 60.0 * 60.0, max_relative = 1e-2);
}

#[test]
fn test_edelbaum_transfer_reaches_target_orbit() {
    // 7000 km at 28.5° to 7500 km at 27.5°, circular start on the x-axis node
    let (a0, af) = (7000.0, 7500.0);
    let (i0, i_f) = (28.5 * RADEG, 27.5 * RADEG);
    let v0 = (MU_EARTH / a0).sqrt();
    let s = state(
        Vector3::new(a0, 0.0, 0.0),
        Vector3::new(0.0, v0 * i0.cos(), v0 * i0.sin()),
    );

    let thrust = EdelbaumThrust::new(MU_EARTH, a0, af, i0, i_f, 1e-5, s.epoch()).unwrap();
    assert_relative_eq!(thrust.delta_v(), 0.326828, max_relative = 1e-5);

    let cowell = CowellPropagator::new(tight()).with_force_model(thrust);
    let arrival = s.epoch() + Duration::from_seconds(thrust.transfer_time());
    let out = cowell.propagate_to(&s, arrival).unwrap();

    let sma = out.semi_major_axis().unwrap().value();
    let h = out.angular_momentum().unwrap();
    let inclination = (h.z / h.norm()).acos();
    assert_relative_eq!(sma, af, max_relative = 1e-3);
    assert!((inclination - i_f).abs() < 0.05 * RADEG, "i = {}°", inclination / RADEG);
    assert!(out.eccentricity().unwrap() < 1e-2);

    // the thrust is off once the transfer is over
    let coast = cowell
        .propagate_to(&out, arrival + Duration::from_seconds(3600.0))
        .unwrap();
    assert_relative_eq!(
        coast.specific_energy().unwrap(),
        out.specific_energy().unwrap(),
        max_relative = 1e-8
    );
}

#[test]
fn test_impact_is_reported() {
    let cowell = CowellPropagator::new(
        CowellParams::builder().collision_radius(6378.0).build().unwrap(),
    );
    // falling straight-ish towards the Earth
    let s = OrbitState::from_vectors(
        MU_EARTH,
        epoch(),
        gcrf(),
        Vector3::new(7000.0, 0.0, 0.0),
        Vector3::new(-3.0, 0.5, 0.0),
    )
    .unwrap();
    let res = cowell.propagate_to(&s, s.epoch() + Duration::from_seconds(3600.0));
    assert!(matches!(res, Err(OrbitError::Propagation(_))));
}
