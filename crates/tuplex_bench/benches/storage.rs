//! Stored map benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tuplex_storage::{InMemoryStoredMap, StorageTxn, StoredMap};

/// Benchmark puts into an in-memory map.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("stored_map_put");

    for count in [100u64, 10_000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let map: InMemoryStoredMap<u64, u64> = InMemoryStoredMap::new("bench");
                for i in 0..count {
                    map.put(i, black_box(i), Some(StorageTxn::new(1))).unwrap();
                }
                black_box(map.len().unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark point lookups.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("stored_map_get");

    for count in [100u64, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let map: InMemoryStoredMap<u64, u64> = InMemoryStoredMap::new("bench");
            for i in 0..count {
                map.put(i, i, None).unwrap();
            }
            let mut key = 0;
            b.iter(|| {
                key = (key + 7) % count;
                black_box(map.get(&key).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark full scans, as coordinators do when resolving candidates.
fn bench_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("stored_map_values");
    group.bench_function("10000", |b| {
        let map: InMemoryStoredMap<u64, String> = InMemoryStoredMap::new("bench");
        for i in 0..10_000u64 {
            map.put(i, format!("value-{i}"), None).unwrap();
        }
        b.iter(|| black_box(map.values().unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_values);
criterion_main!(benches);
