//! Throughput benchmarks for the concurrent hash trie

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use petek_trie::Ctrie;
use std::sync::Arc;
use std::thread;

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [100, 1000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let trie: Ctrie<u64> = Ctrie::new();
                for i in 0..size as u64 {
                    trie.insert(&i.to_be_bytes(), i);
                }
                black_box(&trie);
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let trie: Ctrie<u64> = Ctrie::new();
    for i in 0..10_000u64 {
        trie.insert(&i.to_be_bytes(), i);
    }
    let trie = Arc::new(trie);

    group.bench_function("single_thread", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = (i % 10_000).to_be_bytes();
            black_box(trie.get(&key));
            i += 1;
        });
    });

    for threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("concurrent", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let trie = trie.clone();
                            thread::spawn(move || {
                                for i in 0..1000u64 {
                                    let key = ((t * 1000 + i) % 10_000).to_be_bytes();
                                    black_box(trie.get(&key));
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove");

    for threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(1000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let trie: Arc<Ctrie<u64>> = Arc::new(Ctrie::new());
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let trie = trie.clone();
                            thread::spawn(move || {
                                for i in 0..1000u64 {
                                    let key = (t as u64 * 1000 + i).to_be_bytes();
                                    trie.insert(&key, i);
                                    trie.remove(&key);
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_80_20");
    group.sample_size(20); // Reduce sample size for long-running benchmarks

    for threads in [4, 8].iter() {
        group.throughput(Throughput::Elements(10_000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let trie: Arc<Ctrie<u64>> = Arc::new(Ctrie::new());
                    for i in 0..1000u64 {
                        trie.insert(&i.to_be_bytes(), i);
                    }
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let trie = trie.clone();
                            thread::spawn(move || {
                                for i in 0..10_000u64 {
                                    let key = (i % 1000).to_be_bytes();
                                    if i % 5 == 0 {
                                        trie.insert(&key, t as u64);
                                    } else {
                                        black_box(trie.get(&key));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_insert_remove,
    bench_mixed
);
criterion_main!(benches);
