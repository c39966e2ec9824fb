use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use flatmap56::FlatMap56;
use hashbrown::HashMap;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Distribution;
use rand_distr::Zipf;

const KEY_MASK: u64 = (1 << 56) - 1;

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 11),
    (1 << 12),
    (1 << 13),
    (1 << 14),
    (1 << 15),
    (1 << 16),
    (1 << 17),
];

fn distinct_keys(rng: &mut SmallRng, n: usize) -> Vec<u64> {
    let mut seen = hashbrown::HashSet::with_capacity(n);
    let mut keys = Vec::with_capacity(n);
    while keys.len() < n {
        let key = rng.random::<u64>() & KEY_MASK;
        if seen.insert(key) {
            keys.push(key);
        }
    }
    keys
}

fn build_flatmap(keys: &[u64]) -> FlatMap56<u64> {
    let mut map = FlatMap56::new().unwrap();
    for &key in keys {
        map.insert(key, key ^ KEY_MASK).unwrap();
    }
    map
}

fn build_hashbrown(keys: &[u64]) -> HashMap<u64, u64> {
    let mut map = HashMap::new();
    for &key in keys {
        map.insert(key, key ^ KEY_MASK);
    }
    map
}

fn bench_insert_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_random");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    let mut rng = SmallRng::from_os_rng();

    for &size in SIZES {
        let keys = distinct_keys(&mut rng, size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(format!("flatmap56/{size}"), &keys, |b, keys| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| black_box(build_flatmap(&keys)),
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(format!("hashbrown/{size}"), &keys, |b, keys| {
            b.iter_batched(
                || {
                    let mut keys = keys.clone();
                    keys.shuffle(&mut SmallRng::from_os_rng());
                    keys
                },
                |keys| black_box(build_hashbrown(&keys)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_lookup_uniform(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_uniform");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    let mut rng = SmallRng::from_os_rng();

    for &size in SIZES {
        let keys = distinct_keys(&mut rng, size);
        let flat = build_flatmap(&keys);
        let brown = build_hashbrown(&keys);

        let mut queries = keys.clone();
        queries.shuffle(&mut rng);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(format!("flatmap56/{size}"), &queries, |b, queries| {
            b.iter(|| {
                let mut hits = 0u64;
                for &key in queries {
                    if flat.get(black_box(key)).is_some() {
                        hits += 1;
                    }
                }
                black_box(hits)
            })
        });

        group.bench_with_input(format!("hashbrown/{size}"), &queries, |b, queries| {
            b.iter(|| {
                let mut hits = 0u64;
                for &key in queries {
                    if brown.get(&black_box(key)).is_some() {
                        hits += 1;
                    }
                }
                black_box(hits)
            })
        });
    }

    group.finish();
}

fn bench_lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_miss");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    let mut rng = SmallRng::from_os_rng();

    for &size in SIZES {
        let keys = distinct_keys(&mut rng, 2 * size);
        let (present, absent) = keys.split_at(size);
        let flat = build_flatmap(present);
        let brown = build_hashbrown(present);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(format!("flatmap56/{size}"), &absent.to_vec(), |b, absent| {
            b.iter(|| {
                let mut hits = 0u64;
                for &key in absent {
                    if flat.get(black_box(key)).is_some() {
                        hits += 1;
                    }
                }
                black_box(hits)
            })
        });

        group.bench_with_input(format!("hashbrown/{size}"), &absent.to_vec(), |b, absent| {
            b.iter(|| {
                let mut hits = 0u64;
                for &key in absent {
                    if brown.get(&black_box(key)).is_some() {
                        hits += 1;
                    }
                }
                black_box(hits)
            })
        });
    }

    group.finish();
}

fn bench_lookup_zipf(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_zipf");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    let mut rng = SmallRng::from_os_rng();

    for &size in SIZES {
        let keys = distinct_keys(&mut rng, size);
        let flat = build_flatmap(&keys);
        let brown = build_hashbrown(&keys);

        let zipf = Zipf::new(size as f64, 1.03).unwrap();
        let queries: Vec<u64> = (0..size)
            .map(|_| keys[zipf.sample(&mut rng) as usize - 1])
            .collect();

        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(format!("flatmap56/{size}"), &queries, |b, queries| {
            b.iter(|| {
                let mut sum = 0u64;
                for &key in queries {
                    sum = sum.wrapping_add(*flat.get(black_box(key)).unwrap());
                }
                black_box(sum)
            })
        });

        group.bench_with_input(format!("hashbrown/{size}"), &queries, |b, queries| {
            b.iter(|| {
                let mut sum = 0u64;
                for &key in queries {
                    sum = sum.wrapping_add(*brown.get(&black_box(key)).unwrap());
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    let mut rng = SmallRng::from_os_rng();

    for &size in SIZES {
        let keys = distinct_keys(&mut rng, 2 * size);
        let (resident, replacement) = keys.split_at(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(
            format!("flatmap56/{size}"),
            &(resident.to_vec(), replacement.to_vec()),
            |b, (resident, replacement)| {
                b.iter_batched(
                    || build_flatmap(resident),
                    |mut map| {
                        for (&out, &input) in resident.iter().zip(replacement) {
                            map.remove(out);
                            map.insert(input, input).unwrap();
                        }
                        black_box(map)
                    },
                    BatchSize::SmallInput,
                )
            },
        );

        group.bench_with_input(
            format!("hashbrown/{size}"),
            &(resident.to_vec(), replacement.to_vec()),
            |b, (resident, replacement)| {
                b.iter_batched(
                    || build_hashbrown(resident),
                    |mut map| {
                        for (&out, &input) in resident.iter().zip(replacement) {
                            map.remove(&out);
                            map.insert(input, input);
                        }
                        black_box(map)
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_random,
    bench_lookup_uniform,
    bench_lookup_miss,
    bench_lookup_zipf,
    bench_churn,
);
criterion_main!(benches);
