//! Criterion benchmarks for paramsweep
//!
//! Run with: cargo bench -p paramsweep

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use paramsweep::{RangeDescriptor, RangeSpec, StandardResolver, Sweep, SweepConfig};

fn three_level_config(size: usize, nprocs: Option<i64>) -> SweepConfig {
    SweepConfig::new(vec![
        RangeSpec::new().with("a", RangeDescriptor::linear(0.0, 1.0, size)),
        RangeSpec::new()
            .with("b", RangeDescriptor::log(1.0, 1000.0, size))
            .with("c", RangeDescriptor::uniform(-1.0, 1.0, size)),
        RangeSpec::new().with("d", RangeDescriptor::normal(0.0, 1.0, size)),
    ])
    .with_nprocs(nprocs)
}

/// Busy work standing in for a simulation step
fn workload(a: f64, b: f64, c: f64, d: f64) -> f64 {
    (0..200).fold(a, |acc, i| (acc + b.ln() * c - d * i as f64).sin())
}

fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion");

    for size in [5, 10, 20] {
        group.bench_with_input(BenchmarkId::new("fresh", size), &size, |bench, &size| {
            bench.iter(|| {
                let sweep =
                    Sweep::new(Arc::new(StandardResolver::seeded(0)), three_level_config(size, Some(1)))
                        .unwrap();
                black_box(sweep.expand().unwrap())
            })
        });

        let mut cached =
            Sweep::new(Arc::new(StandardResolver::seeded(0)), three_level_config(size, Some(1)))
                .unwrap();
        cached.grid().unwrap();
        group.bench_with_input(BenchmarkId::new("cached", size), &size, |bench, _| {
            bench.iter(|| black_box(cached.expand().unwrap()))
        });
    }

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    group.sample_size(20);

    for (label, nprocs) in [("sequential", Some(1)), ("parallel", None)] {
        let mut sweep = Sweep::new(Arc::new(StandardResolver::seeded(0)), three_level_config(10, nprocs))
            .unwrap()
            .with_function(|p, _| Ok(workload(p["a"], p["b"], p["c"], p["d"])));
        sweep.grid().unwrap();

        group.bench_function(label, |bench| {
            bench.iter(|| {
                let total: f64 = sweep
                    .iter()
                    .unwrap()
                    .filter_map(|r| r.ok().and_then(|(_, out)| out.into_value()))
                    .sum();
                black_box(total)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expansion, bench_evaluation);
criterion_main!(benches);
