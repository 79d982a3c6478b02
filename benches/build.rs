//! Benchmarks for adaptive builds and batch evaluation.
//!
//! Run with: cargo bench --bench build

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use gridinterp::errors::IPError;
use gridinterp::function::ParallelPointwise;
use gridinterp::interpolators::{GradientFactory, Interpolator, MultilinearFactory};
use gridinterp::refinement::{build, BuildOptions, BuildOutput};
use gridinterp::storage::{bounding_box::BoundingBox, tensor::Tensor};

fn target(x: &[f64]) -> Vec<f64> {
    vec![(3.0 * x[0]).sin() * (2.0 * x[1]).cos() + x.iter().skip(2).sum::<f64>()]
}

fn build_multilinear(ndim: usize, tolerance: f64) -> Result<BuildOutput<gridinterp::interpolators::multilinear::MultilinearInterpolator>, IPError> {
    let bbox = BoundingBox::new(&vec![0.0; ndim], &vec![1.0; ndim]);
    let f = ParallelPointwise::new(1, target);
    build(&f, &MultilinearFactory, &bbox, &[tolerance], &BuildOptions::default().with_max_mesh_size(1 << 22))
}

fn query_points(ndim: usize, npts: usize) -> Tensor {
    let data = (0..ndim * npts).map(|i| ((i * 7919) % 1000) as f64 / 1000.0).collect();
    Tensor::new(vec![ndim, npts], data).unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Adaptive build");
    for tolerance in [1e-2, 1e-3] {
        group.bench_with_input(BenchmarkId::new("multilinear 2D", tolerance), &tolerance, |b, &tol| {
            b.iter(|| build_multilinear(2, tol).unwrap())
        });
    }
    let bbox = BoundingBox::new(&[0.0; 3], &[1.0; 3]);
    let f = ParallelPointwise::new(1, target);
    group.bench_function("gradient 3D", |b| {
        b.iter(|| build(&f, &GradientFactory, &bbox, &[1e-2], &BuildOptions::default()).unwrap())
    });
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch evaluation");
    for ndim in [2, 4] {
        let out = build_multilinear(ndim, 1e-2).unwrap();
        let points = query_points(ndim, 10_000);
        group.bench_with_input(BenchmarkId::new("multilinear", format!("{ndim}D")), &points, |b, points| {
            b.iter(|| out.interpolator.evaluate(points).unwrap())
        });
        println!("{ndim}D resolution: {:?}", out.resolution);
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_evaluate);
criterion_main!(benches);
