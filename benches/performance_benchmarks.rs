use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use slipstream::congestion::UnthrottledState;
use slipstream::{
    build_address_set, parse_endpoint, CongestionAlgorithm, Notification, PathCongestion, SystemResolver,
    Unthrottled,
};
use tokio::runtime::Runtime;

/// Benchmark endpoint parsing for each accepted form
fn bench_parse_endpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_endpoint");

    for raw in ["1.1.1.1", "8.8.8.8:53", "[2001:db8::1]:53", "resolver.example.com:5353"] {
        group.bench_with_input(BenchmarkId::from_parameter(raw), raw, |b, raw| {
            b.iter(|| parse_endpoint(black_box(raw), 53))
        });
    }

    group.finish();
}

/// Benchmark building a literal-only resolver set
fn bench_build_address_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let resolvers: Vec<String> = (1..=16).map(|i| format!("192.0.2.{}:53", i)).collect();

    let mut group = c.benchmark_group("build_address_set");
    group.throughput(Throughput::Elements(resolvers.len() as u64));

    group.bench_function("16_ipv4_literals", |b| {
        b.iter(|| rt.block_on(async { build_address_set(&SystemResolver, black_box(&resolvers)).await }))
    });

    group.finish();
}

/// Benchmark the per-ack notify hook
fn bench_unthrottled_notify(c: &mut Criterion) {
    let mut path: PathCongestion<UnthrottledState> = PathCongestion::new(12_000);
    Unthrottled.on_path_init(&mut path);

    let mut group = c.benchmark_group("unthrottled");
    group.throughput(Throughput::Elements(1));

    group.bench_function("on_notify_ack", |b| {
        b.iter(|| {
            Unthrottled.on_notify(&mut path, black_box(Notification::Acknowledgement { bytes: 1200 }));
            path.cwin
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_endpoint,
    bench_build_address_set,
    bench_unthrottled_notify
);
criterion_main!(benches);
