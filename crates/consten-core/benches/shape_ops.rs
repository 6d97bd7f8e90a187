//! Benchmarks for group-restricted shape operations.
//!
//! Run with:
//! ```bash
//! cargo bench --bench shape_ops
//! ```

use consten_core::tensor::Tensor;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

fn bench_base_reshape(c: &mut Criterion) {
    let mut group = c.benchmark_group("base_reshape");

    let cases = vec![
        ("small_batch", vec![8], vec![3, 3]),
        ("wide_batch", vec![1024], vec![3, 3]),
        ("vectorized", vec![128], vec![6, 6]),
    ];

    for (name, dynamic, base) in cases {
        let t = Tensor::<f64>::ones(dynamic.as_slice().into(), &[4], &base);
        let flat = vec![base.iter().product::<usize>()];
        group.throughput(Throughput::Elements(t.array().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &t, |b, t| {
            b.iter(|| {
                let r = t.base_reshape(black_box(&flat)).unwrap();
                black_box(r);
            });
        });
    }

    group.finish();
}

fn bench_broadcast_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("intmd_expand");

    for &n in &[4usize, 16, 64] {
        let t = Tensor::<f64>::ones([64].into(), &[1], &[3, 3]);
        group.throughput(Throughput::Elements((64 * n * 9) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let e = t.intmd_expand(black_box(&[n])).unwrap();
                black_box(e);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_base_reshape, bench_broadcast_expand);
criterion_main!(benches);
