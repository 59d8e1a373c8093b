use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use softheap::SoftHeap;

fn insert_then_drain(n: i32, epsilon: f64) {
    let mut h = SoftHeap::new(epsilon).expect("valid epsilon");
    for i in 0..n {
        h.insert(i);
    }
    while h.extract_min().is_ok() {}
}

fn insert_only(n: i32, epsilon: f64) {
    let mut h = SoftHeap::new(epsilon).expect("valid epsilon");
    for i in 0..n {
        h.insert(i);
    }
}

fn meld_two_heaps(n: i32, epsilon: f64) {
    let mut a = SoftHeap::new(epsilon).expect("valid epsilon");
    let mut b = SoftHeap::new(epsilon).expect("valid epsilon");
    for i in 0..n {
        a.insert(i);
        b.insert(n + i);
    }
    a.meld(b).expect("matching epsilon");
}

fn insert_then_drain_by_epsilon(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_then_drain (1000)");
    for &epsilon in &[0.001, 0.01, 0.1, 0.3] {
        group.bench_with_input(
            BenchmarkId::from_parameter(epsilon),
            &epsilon,
            |b, &epsilon| b.iter(|| insert_then_drain(1_000, epsilon)),
        );
    }
    group.finish();
}

fn insert_only_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_only (epsilon = 0.1)");
    for &n in &[1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| insert_only(n, 0.1))
        });
    }
    group.finish();
}

fn meld_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("meld (epsilon = 0.1)");
    for &n in &[1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| meld_two_heaps(n, 0.1))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    insert_then_drain_by_epsilon,
    insert_only_by_size,
    meld_by_size
);
criterion_main!(benches);
