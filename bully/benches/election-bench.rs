#[path = "../tests/common.rs"]
mod common;

use bully::{Cluster, ProcessId, Variant};
use common::{test_params, CONVERGENCE_WAIT};
use convi::ExpectFrom;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn criterion_benchmark(c: &mut Criterion) {
    let sizes = [3usize, 5, 8];

    for variant in [Variant::Original, Variant::Improved] {
        let mut group = c.benchmark_group(format!("election {variant}"));
        group.sample_size(10);

        for size in sizes {
            group.throughput(criterion::Throughput::Elements(u64::expect_from(size)));
            group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, size| {
                b.iter(|| {
                    let cluster = Cluster::new(*size, test_params(variant)).unwrap();
                    cluster.start_election(ProcessId(0)).unwrap();
                    let winner = cluster.wait_for_convergence(CONVERGENCE_WAIT);
                    assert_eq!(winner, cluster.highest_live_id());
                })
            });
        }
        group.finish();
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
