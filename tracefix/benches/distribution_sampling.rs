//! Benchmarks for distribution sampling and the affinity rewrite loop
//!
//! Sampling sits on the per-order-line hot path of every affinity pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracefix::config::AffinityConfig;
use tracefix::distribution::{paired_affinity, DiscreteDistribution};
use tracefix::partition::ModuloHasher;
use tracefix::rewrite::AffinityRewriter;
use tracefix::{ParamValue, QueryTrace, Trace, TransactionTrace};

fn bench_flat_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_sample");
    group.throughput(Throughput::Elements(1));

    for range in [2i64, 64, 100_000] {
        let mut dist = DiscreteDistribution::flat(0, range, StdRng::seed_from_u64(7)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(range), &range, |b, _| {
            b.iter(|| black_box(dist.sample()));
        });
    }

    group.finish();
}

fn bench_zipf_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("zipf_sample");
    group.throughput(Throughput::Elements(1));

    for sigma in [0.5, 1.0, 2.0] {
        let mut dist = DiscreteDistribution::zipf(1, 65, sigma, StdRng::seed_from_u64(7)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(sigma), &sigma, |b, _| {
            b.iter(|| black_box(dist.sample()));
        });
    }

    group.finish();
}

fn neworder(id: u64, warehouse: i64, lines: usize) -> TransactionTrace {
    let int = ParamValue::Int;
    let mut txn = TransactionTrace::new(
        id,
        "neworder",
        vec![
            int(warehouse),
            int(1),
            int(1),
            ParamValue::Text("2024-01-01".into()),
            ParamValue::IntArray((1..=lines as i64).collect()),
            ParamValue::IntArray(vec![warehouse; lines]),
            ParamValue::IntArray(vec![1; lines]),
        ],
    );
    for line in 0..lines {
        let item = line as i64 + 1;
        txn.queries.push(QueryTrace::new(0, format!("getStockInfo{:02}", line + 1), vec![int(item), int(warehouse)]));
        txn.queries.push(QueryTrace::new(0, "updateStock", vec![int(1), int(1), int(1), int(0), int(item), int(warehouse)]));
        txn.queries.push(QueryTrace::new(
            0,
            "createOrderLine",
            vec![int(1), int(1), int(warehouse), int(item), int(item), int(warehouse), int(1)],
        ));
    }
    txn
}

fn bench_partition_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_rewrite");
    let config = AffinityConfig {
        remote_item_pct: 100,
        ..AffinityConfig::default()
    };
    let hasher = ModuloHasher::new(8);

    for txns in [1_000u64, 10_000] {
        let trace = Trace::new((0..txns).map(|i| neworder(i, (i % 32) as i64 + 1, 10)).collect());
        group.throughput(Throughput::Elements(txns));

        group.bench_with_input(BenchmarkId::from_parameter(txns), &trace, |b, trace| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(3);
                let mut distributions = paired_affinity(8, &mut rng).unwrap();
                let mut trace = trace.clone();
                AffinityRewriter::new(&config, rng)
                    .rewrite_partitions(&mut trace, &hasher, &mut distributions)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flat_sampling, bench_zipf_sampling, bench_partition_rewrite);
criterion_main!(benches);
