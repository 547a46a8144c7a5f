mod common;

use nalgebra::Vector3;
use orbitkit::lambert::{solve_many, LambertBranch, LambertParams, LambertProblem, TransferPath};
use orbitkit::orbit_errors::OrbitError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{assert_vec_close, random_position, state, MU};

fn random_problems(seed: u64, n: usize) -> Vec<LambertProblem> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut problems = Vec::with_capacity(n);
    while problems.len() < n {
        let r1 = random_position(&mut rng, 6800.0, 42_000.0);
        let r2 = random_position(&mut rng, 6800.0, 42_000.0);
        if r1.cross(&r2).norm() < 0.05 * r1.norm() * r2.norm() {
            continue;
        }
        let tof = rng.random_range(600.0..30_000.0);
        let path = if rng.random_bool(0.5) {
            TransferPath::Prograde
        } else {
            TransferPath::Retrograde
        };
        problems.push(LambertProblem::new(r1, r2, tof, MU, path).unwrap());
    }
    problems
}

#[test]
fn test_solutions_reach_the_target() {
    let params = LambertParams::default();
    for problem in random_problems(42, 200) {
        let sol = problem
            .solve_single(0, LambertBranch::Single, &params)
            .unwrap();
        let arrival = state(*problem.r1(), sol.v1)
            .propagate(problem.time_of_flight())
            .unwrap();
        let (r, v) = arrival.rv().unwrap();
        assert_vec_close(&r, problem.r2(), 1e-7);
        assert_vec_close(&v, &sol.v2, 1e-7);
    }
}

#[test]
fn test_reverse_problem_gives_time_reversed_velocities() {
    let params = LambertParams::default();
    for problem in random_problems(7, 100) {
        let forward = problem.solve(0, &params).unwrap();
        let backward = problem.reversed().solve(0, &params).unwrap();
        assert_vec_close(&backward[0].v1, &-forward[0].v2, 1e-7);
        assert_vec_close(&backward[0].v2, &-forward[0].v1, 1e-7);
    }
}

#[test]
fn test_multi_revolution_solutions_reach_the_target() {
    let problem = LambertProblem::new(
        Vector3::new(8000.0, 1000.0, 0.0),
        Vector3::new(-2000.0, 11_000.0, 3000.0),
        60_000.0,
        MU,
        TransferPath::Prograde,
    )
    .unwrap();
    let solutions = problem.solve(3, &LambertParams::default()).unwrap();
    assert_eq!(solutions.len(), 7);

    for sol in &solutions {
        let arrival = state(*problem.r1(), sol.v1)
            .propagate(problem.time_of_flight())
            .unwrap();
        assert_vec_close(&arrival.rv().unwrap().0, problem.r2(), 1e-6);
    }
}

#[test]
fn test_half_turn_is_rejected() {
    let problem = LambertProblem::new(
        Vector3::new(7000.0, 0.0, 0.0),
        Vector3::new(-12_000.0, 0.0, 0.0),
        5000.0,
        MU,
        TransferPath::Prograde,
    )
    .unwrap();
    let res = problem.solve(0, &LambertParams::default());
    assert!(matches!(res, Err(OrbitError::DegenerateGeometry(_))));
}

#[test]
fn test_non_positive_time_of_flight_is_rejected() {
    let res = LambertProblem::new(
        Vector3::new(7000.0, 0.0, 0.0),
        Vector3::new(0.0, 7000.0, 0.0),
        0.0,
        MU,
        TransferPath::ShortWay,
    );
    assert!(matches!(res, Err(OrbitError::InvalidArgument(_))));
}

#[test]
fn test_batch_matches_individual_solves() {
    let problems = random_problems(99, 16);
    let params = LambertParams::default();
    let batch = solve_many(&problems, 1, &params);
    for (problem, result) in problems.iter().zip(batch) {
        assert_eq!(result.unwrap(), problem.solve(1, &params).unwrap());
    }
}
