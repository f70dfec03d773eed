use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use num_complex::Complex64;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sieve_parvec::algs::reduction::{local_dot, local_master_norm2};
use sieve_parvec::prelude::*;

fn random_reals(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn bench_local_dot(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_dot");
    for &n in &[1_000usize, 100_000] {
        let a = random_reals(n, 1);
        let b = random_reals(n, 2);
        group.bench_with_input(BenchmarkId::new("f64", n), &n, |bch, _| {
            bch.iter(|| local_dot(black_box(&a), black_box(&b), false))
        });
        let za: Vec<Complex64> = a.chunks(2).map(|p| Complex64::new(p[0], p[1])).collect();
        let zb: Vec<Complex64> = b.chunks(2).map(|p| Complex64::new(p[0], p[1])).collect();
        group.bench_with_input(BenchmarkId::new("complex_conj", n), &n, |bch, _| {
            bch.iter(|| local_dot(black_box(&za), black_box(&zb), true))
        });
    }
    group.finish();
}

fn bench_master_norm(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_norm2");
    for &ndof in &[1_000usize, 100_000] {
        let comm = RayonComm::world(2).swap_remove(0);
        // every tenth dof is replicated on rank 1
        let dofs = ParallelDofs::builder(comm, ndof)
            .entry_size(3)
            .share_all(1, (0..ndof).step_by(10))
            .build()
            .expect("partition");
        let values = random_reals(ndof * 3, 3);
        group.bench_with_input(BenchmarkId::new("entry_size_3", ndof), &ndof, |bch, _| {
            bch.iter(|| local_master_norm2(black_box(&values), &dofs))
        });
    }
    group.finish();
}

fn bench_serial_vector_norm(c: &mut Criterion) {
    let ndof = 100_000;
    let dofs = Arc::new(ParallelDofs::unshared(NoComm, ndof, 1).expect("partition"));
    let mut v = ParallelVector::from_values(
        Some(dofs),
        random_reals(ndof, 4),
        ParallelStatus::Cumulated,
    )
    .expect("vector");
    c.bench_function("vector_norm_serial", |bch| {
        bch.iter(|| v.norm().expect("norm"))
    });
}

criterion_group!(
    benches,
    bench_local_dot,
    bench_master_norm,
    bench_serial_vector_norm
);
criterion_main!(benches);
