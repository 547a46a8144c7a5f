use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use orbitkit::lambert::{solve_many, LambertParams, LambertProblem, TransferPath};

const MU: f64 = 398_600.4418;

fn random_problem(rng: &mut StdRng) -> LambertProblem {
    loop {
        let mut pos = || {
            let radius = rng.random_range(6800.0..42_000.0);
            let lon = rng.random_range(0.0..std::f64::consts::TAU);
            let lat = rng.random_range(-1.0..1.0_f64);
            radius * Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
        };
        let (r1, r2) = (pos(), pos());
        if r1.cross(&r2).norm() < 0.05 * r1.norm() * r2.norm() {
            continue;
        }
        let tof = rng.random_range(600.0..30_000.0);
        if let Ok(p) = LambertProblem::new(r1, r2, tof, MU, TransferPath::Prograde) {
            return p;
        }
    }
}

/// Curtis example 5.2, zero revolution.
fn bench_single(c: &mut Criterion) {
    let problem = LambertProblem::new(
        Vector3::new(5000.0, 10000.0, 2100.0),
        Vector3::new(-14600.0, 2500.0, 7000.0),
        3600.0,
        MU,
        TransferPath::Prograde,
    )
    .unwrap();
    let params = LambertParams::default();

    c.bench_function("lambert/curtis_5_2", |b| {
        b.iter(|| black_box(problem.solve(black_box(0), &params).ok()))
    });
}

/// Random problems up to two revolutions.
fn bench_multi_revolution(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x1A3B);
    let params = LambertParams::default();

    c.bench_function("lambert/random_up_to_2_revs", |b| {
        b.iter_batched(
            || (0..1_000).map(|_| random_problem(&mut rng)).collect::<Vec<_>>(),
            |problems| black_box(solve_many(&problems, 2, &params)),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_single, bench_multi_revolution
);
criterion_main!(benches);
