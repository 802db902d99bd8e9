use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use memtable::MemTable;
use sstable::{SSTableReader, SSTableWriter};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;
const BLOCK_SIZE: usize = 4096;

fn build_memtable() -> MemTable {
    let mut mem = MemTable::new();
    for i in 0..N_KEYS {
        mem.set(format!("key{i:05}"), vec![b'x'; VALUE_SIZE], i as u64);
    }
    mem
}

fn sstable_write_benchmark(c: &mut Criterion) {
    c.bench_function("sstable_write_from_memtable_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.st");
                let mem = build_memtable();
                (dir, path, mem)
            },
            |(_dir, path, mem)| {
                SSTableWriter::write_from_memtable(&path, &mem, BLOCK_SIZE).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn sstable_get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("sstable_get_hit_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.st");

                let mem = build_memtable();
                SSTableWriter::write_from_memtable(&path, &mem, BLOCK_SIZE).unwrap();

                let reader = SSTableReader::open(&path).unwrap();
                (dir, reader)
            },
            |(_dir, reader)| {
                for i in 0..N_KEYS {
                    let key = format!("key{i:05}");
                    let v = reader.get(&key).unwrap();
                    assert!(v.is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn sstable_get_miss_benchmark(c: &mut Criterion) {
    c.bench_function("sstable_get_miss_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.st");

                let mem = build_memtable();
                SSTableWriter::write_from_memtable(&path, &mem, BLOCK_SIZE).unwrap();

                let reader = SSTableReader::open(&path).unwrap();
                (dir, reader)
            },
            |(_dir, reader)| {
                for i in 0..N_KEYS {
                    let key = format!("missing{i:05}");
                    let v = reader.get(&key).unwrap();
                    assert!(v.is_none());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    sstable_write_benchmark,
    sstable_get_hit_benchmark,
    sstable_get_miss_benchmark
);
criterion_main!(benches);
