//! Benchmark: multigrid cycle throughput on the 1-D Laplacian
//!
//! Measures hierarchy setup and a single preconditioner application for the
//! V and W cycles as the fine grid is refined.
//!
//! Run with:
//!   cargo bench -p math-multigrid --bench cycle_throughput

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use math_multigrid::{CycleShape, Grid1d, MgConfig, MgType, Multigrid};
use ndarray::Array1;
use std::time::Duration;

fn hierarchy(k: u32, config: MgConfig) -> Multigrid<f64> {
    let grid = Grid1d::<f64>::dyadic(k).unwrap();
    let mut mg = Multigrid::from_discretization(Box::new(grid), config).unwrap();
    mg.setup().unwrap();
    mg
}

/// Benchmark Galerkin setup of the whole hierarchy
fn bench_setup(c: &mut Criterion) {
    let mut group = c.benchmark_group("setup");
    group.measurement_time(Duration::from_secs(5));

    for &k in &[8u32, 12, 16] {
        let n = (1usize << k) - 1;
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("galerkin", k), &k, |b, &k| {
            b.iter(|| {
                let mg = hierarchy(k, MgConfig::for_poisson());
                black_box(mg.num_levels())
            });
        });
    }

    group.finish();
}

/// Benchmark one application per cycle shape and level combination
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    group.measurement_time(Duration::from_secs(5));

    let variants = [
        ("v", MgType::Multiplicative, CycleShape::V),
        ("w", MgType::Multiplicative, CycleShape::W),
        ("full", MgType::Full, CycleShape::V),
        ("additive", MgType::Additive, CycleShape::V),
    ];

    for &k in &[10u32, 14] {
        let n = (1usize << k) - 1;
        let b = Array1::from_elem(n, 1.0);
        group.throughput(Throughput::Elements(n as u64));

        for (name, mg_type, cycle) in variants {
            let config = MgConfig {
                mg_type,
                cycle,
                ..MgConfig::for_poisson()
            };
            let mut mg = hierarchy(k, config);
            let mut x = Array1::zeros(n);
            group.bench_with_input(BenchmarkId::new(name, k), &b, |bench, b| {
                bench.iter(|| {
                    let failure = mg.apply(black_box(b), &mut x).unwrap();
                    black_box(failure)
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_setup, bench_apply);
criterion_main!(benches);
