use config::Config;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::Engine;
use tempfile::tempdir;

const N_KEYS: usize = 2_000;

fn tiny_flush_config() -> Config {
    Config {
        mem_max_bytes: 64 * 1024,
        level0_max_files: 4,
        levels_max: 7,
        block_size_bytes: 4096,
    }
}

fn engine_set_benchmark(c: &mut Criterion) {
    c.bench_function("engine_set_2k_with_flushes", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let engine = Engine::open(dir.path(), tiny_flush_config()).unwrap();
                (dir, engine)
            },
            |(_dir, mut engine)| {
                for i in 0..N_KEYS {
                    engine
                        .set(format!("key{i:05}"), vec![b'x'; 100])
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn engine_get_benchmark(c: &mut Criterion) {
    c.bench_function("engine_get_hit_2k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut engine = Engine::open(dir.path(), tiny_flush_config()).unwrap();
                for i in 0..N_KEYS {
                    engine
                        .set(format!("key{i:05}"), vec![b'x'; 100])
                        .unwrap();
                }
                (dir, engine)
            },
            |(_dir, engine)| {
                for i in 0..N_KEYS {
                    let key = format!("key{i:05}");
                    assert!(engine.get(&key).unwrap().is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, engine_set_benchmark, engine_get_benchmark);
criterion_main!(benches);
