//! Benchmarks for deformation operations.

use criterion::{criterion_group, criterion_main, Criterion};
use ductile::prelude::*;
use ductile::solver::laplacian::build_laplacian;
use ductile::solver::weights::compute_fan_weights;
use nalgebra::{Point3, Vector3};

fn pinned_grid_engine(n: usize, options: ArapOptions) -> (ArapEngine, Vec<Point3<f64>>) {
    let mesh = grid(n, n, 1.0 / n as f64).unwrap();
    let positions = mesh.positions().to_vec();
    let last = positions.len() - 1;

    let mut engine = ArapEngine::new(mesh, options).unwrap();
    engine.cycle_constraint(0, &positions).unwrap();
    engine.cycle_constraint(0, &positions).unwrap();
    engine.toggle_constraint(last, &positions).unwrap();
    (engine, positions)
}

fn bench_setup(c: &mut Criterion) {
    let mesh = grid(50, 50, 0.02).unwrap();

    c.bench_function("fan_weights_50x50", |b| {
        b.iter(|| compute_fan_weights(&mesh, 1e-12));
    });

    let weights = compute_fan_weights(&mesh, 1e-12);
    c.bench_function("laplacian_50x50", |b| {
        b.iter(|| build_laplacian(&weights));
    });
}

fn bench_step(c: &mut Criterion) {
    let (mut engine, mut positions) = pinned_grid_engine(50, ArapOptions::default());
    engine.step(&mut positions, 1).unwrap();

    c.bench_function("step_50x50_parallel", |b| {
        b.iter(|| {
            engine.translate_handles(Vector3::new(0.0, 0.0, 1e-4));
            engine.step(&mut positions, 1).unwrap()
        });
    });

    let (mut engine, mut positions) = pinned_grid_engine(50, ArapOptions::default().sequential());
    engine.step(&mut positions, 1).unwrap();

    c.bench_function("step_50x50_sequential", |b| {
        b.iter(|| {
            engine.translate_handles(Vector3::new(0.0, 0.0, 1e-4));
            engine.step(&mut positions, 1).unwrap()
        });
    });
}

fn bench_refactorize(c: &mut Criterion) {
    let (mut engine, mut positions) = pinned_grid_engine(50, ArapOptions::default());

    c.bench_function("refactorize_50x50", |b| {
        b.iter(|| {
            // Every toggle changes membership
            engine.toggle_constraint(1300, &positions).unwrap();
            engine.step(&mut positions, 0).unwrap()
        });
    });
}

criterion_group!(benches, bench_setup, bench_step, bench_refactorize);
criterion_main!(benches);
