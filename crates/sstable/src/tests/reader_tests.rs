use crate::*;
use anyhow::Result;
use memtable::MemTable;
use tempfile::tempdir;

fn make_sample_memtable() -> MemTable {
    let mut m = MemTable::new();
    m.set("a".to_string(), b"apple".to_vec(), 1);
    m.set("b".to_string(), b"banana".to_vec(), 2);
    m.set("c".to_string(), b"".to_vec(), 3);
    m.delete("d".to_string(), 4);
    m
}

// -------------------- Basic open & get --------------------

#[test]
fn open_and_get_entries() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sample.st");

    let mem = make_sample_memtable();
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;
    let reader = SSTableReader::open(&path)?;

    let a = reader.get("a")?.expect("a must exist");
    assert_eq!(a.seq, 1);
    assert_eq!(a.value, Some(b"apple".to_vec()));

    let b = reader.get("b")?.expect("b must exist");
    assert_eq!(b.seq, 2);
    assert_eq!(b.value, Some(b"banana".to_vec()));

    let c = reader.get("c")?.expect("c must exist");
    assert_eq!(c.seq, 3);
    assert_eq!(c.value, Some(b"".to_vec()));

    let d = reader.get("d")?.expect("d must exist");
    assert_eq!(d.seq, 4);
    assert_eq!(d.value, None);

    assert!(reader.get("nope")?.is_none());

    Ok(())
}

// -------------------- len / is_empty --------------------

#[test]
fn len_and_is_empty() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("len.st");

    let mem = make_sample_memtable();
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    assert_eq!(reader.len(), 4);
    assert!(!reader.is_empty());

    Ok(())
}

// -------------------- Large values --------------------

#[test]
fn large_value_roundtrip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bigval.st");

    let mut mem = MemTable::new();
    let big = vec![b'x'; 500_000];
    mem.set("big".to_string(), big, 1);
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    let entry = reader.get("big")?.unwrap();
    assert_eq!(entry.value.unwrap().len(), 500_000);

    Ok(())
}

// -------------------- Key-range rejection --------------------

#[test]
fn get_outside_min_max_range_is_none_without_block_read() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("range.st");

    let mut mem = MemTable::new();
    mem.set("m".to_string(), b"1".to_vec(), 1);
    mem.set("n".to_string(), b"2".to_vec(), 2);
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    assert!(reader.get("a")?.is_none());
    assert!(reader.get("z")?.is_none());
    assert_eq!(reader.min_key(), "m");
    assert_eq!(reader.max_key(), "n");

    Ok(())
}

// -------------------- Range scans --------------------

#[test]
fn range_returns_inclusive_bounds() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("range_scan.st");

    let mut mem = MemTable::new();
    for k in ["a", "b", "c", "d", "e"] {
        mem.set(k.to_string(), b"v".to_vec(), 1);
    }
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    let got: Vec<String> = reader.range("b", "d")?.into_iter().map(|(k, _)| k).collect();
    assert_eq!(got, vec!["b", "c", "d"]);

    Ok(())
}

#[test]
fn range_across_multiple_blocks() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("range_multi.st");

    let mut mem = MemTable::new();
    for i in 0..300u64 {
        mem.set(format!("key{:04}", i), vec![b'x'; 50], i);
    }
    SSTableWriter::write_from_memtable(&path, &mem, 256)?;

    let reader = SSTableReader::open(&path)?;
    assert!(reader.block_count() > 1);

    let got = reader.range("key0100", "key0110")?;
    assert_eq!(got.len(), 11);
    assert_eq!(got[0].0, "key0100");
    assert_eq!(got[10].0, "key0110");

    Ok(())
}

// -------------------- iter_all --------------------

#[test]
fn iter_all_returns_every_entry_in_order() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("iterall.st");

    let mem = make_sample_memtable();
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    let all = reader.iter_all()?;
    let keys: Vec<&str> = all.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d"]);

    Ok(())
}

// -------------------- Validation errors --------------------

#[test]
fn open_file_too_small() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.st");
    std::fs::write(&path, b"sh").unwrap();

    let result = SSTableReader::open(&path);
    assert!(result.is_err());
}

#[test]
fn open_bad_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("badmagic.st");

    let mut data = vec![0xBAu8, 0xAD, 0xF0, 0x0D]; // wrong magic, 4 bytes
    data.extend_from_slice(&4u32.to_le_bytes()); // footer_len claims 4 bytes
    std::fs::write(&path, &data).unwrap();

    let result = SSTableReader::open(&path);
    assert!(result.is_err());
}

#[test]
fn open_nonexistent_file() {
    let result = SSTableReader::open("/tmp/no_such_sorted_table_for_tests.st");
    assert!(result.is_err());
}

// -------------------- Corruption detection --------------------

#[test]
fn corrupted_block_fails_crc_check() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("corrupt.st");

    let mem = make_sample_memtable();
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    // Flip a byte early in the file (inside the first data block).
    let mut data = std::fs::read(&path)?;
    data[0] ^= 0xFF;
    std::fs::write(&path, &data)?;

    let reader = SSTableReader::open(&path)?;
    let result = reader.get("a");
    assert!(result.is_err());

    Ok(())
}

// -------------------- Multiple gets on same reader --------------------

#[test]
fn multiple_gets_same_reader() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("multi.st");

    let mut mem = MemTable::new();
    for i in 0..100u64 {
        mem.set(format!("k{:03}", i), b"v".to_vec(), i);
    }
    SSTableWriter::write_from_memtable(&path, &mem, 4096)?;

    let reader = SSTableReader::open(&path)?;
    for _ in 0..2 {
        for i in 0..100u64 {
            let entry = reader.get(&format!("k{:03}", i))?.unwrap();
            assert_eq!(entry.seq, i);
        }
    }

    Ok(())
}
