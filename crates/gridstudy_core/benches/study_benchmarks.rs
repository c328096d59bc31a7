//! Criterion benchmarks for gridstudy_core
//!
//! Run with: cargo bench -p gridstudy_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridstudy_core::{
    ParamSet, ParameterGrid, StudyConfig, TableSpec, TrialContext, TrialError, TrialResult,
    make_table, run_study,
};
use rand_distr::{Distribution, Normal};

fn create_grid() -> ParameterGrid {
    ParameterGrid::new()
        .with("n", [10, 50, 100, 500])
        .with("loc", [0.0, 0.2, 0.4, 0.6, 0.8, 1.0])
        .with("scale", [1, 2])
}

fn z_test(params: &ParamSet, ctx: &TrialContext) -> Result<TrialResult, TrialError> {
    let n = params.usize("n")?;
    let scale = params.f64("scale")?;
    let normal = Normal::new(params.f64("loc")?, scale)?;
    let mut rng = ctx.rng();
    let sum: f64 = (0..n).map(|_| normal.sample(&mut rng)).sum();
    let z = (sum / n as f64) / (scale / (n as f64).sqrt());
    Ok(TrialResult::single("decision", f64::from(u8::from(z.abs() > 1.96))))
}

fn bench_sequential_study(c: &mut Criterion) {
    let grid = create_grid();
    let config = StudyConfig::new(20).raw(false).seed(42);

    c.bench_function("z_test_48x20_sequential", |b| {
        b.iter(|| run_study(&z_test, black_box(&grid), black_box(&config)))
    });
}

fn bench_degree(c: &mut Criterion) {
    let mut group = c.benchmark_group("degree");
    let grid = create_grid();

    for degree in [1, 2, 4].iter() {
        let config = StudyConfig::new(50).raw(false).seed(42).degree(*degree);
        group.bench_with_input(BenchmarkId::new("z_test_48x50", degree), degree, |b, _| {
            b.iter(|| run_study(&z_test, black_box(&grid), black_box(&config)))
        });
    }

    group.finish();
}

fn bench_pivot(c: &mut Criterion) {
    let grid = create_grid();
    let output = run_study(&z_test, &grid, &StudyConfig::new(100).seed(42))
        .expect("benchmark study should run");
    let spec = TableSpec::new().rows(["n"]).cols(["loc", "scale"]);

    c.bench_function("pivot_raw_4x12", |b| {
        b.iter(|| make_table(black_box(&output.result), black_box(&spec)))
    });
}

criterion_group!(benches, bench_sequential_study, bench_degree, bench_pivot);

criterion_main!(benches);
