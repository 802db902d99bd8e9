use super::helpers::tiny_flush_config;
use crate::*;
use anyhow::Result;
use config::Config;
use tempfile::tempdir;

// --------------------- range (scan) ---------------------

#[test]
fn range_full_span() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Config::default())?;

    engine.set("a", b"1".to_vec())?;
    engine.set("b", b"2".to_vec())?;
    engine.set("c", b"3".to_vec())?;

    let results = engine.range("", "\u{10FFFF}")?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], ("a".to_string(), b"1".to_vec()));
    assert_eq!(results[1], ("b".to_string(), b"2".to_vec()));
    assert_eq!(results[2], ("c".to_string(), b"3".to_vec()));
    Ok(())
}

#[test]
fn range_bounded() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Config::default())?;

    for c in b'a'..=b'z' {
        let k = (c as char).to_string();
        engine.set(k, vec![c])?;
    }

    // Inclusive [b, d] should return b, c, d.
    let results = engine.range("b", "d")?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "b");
    assert_eq!(results[2].0, "d");
    Ok(())
}

#[test]
fn range_across_memtable_and_tables() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), tiny_flush_config())?;

    for i in 0..20u64 {
        engine.set(format!("k{i:04}"), b"val".to_vec())?;
    }

    let results = engine.range("", "\u{10FFFF}")?;
    assert_eq!(results.len(), 20);
    for i in 0..19 {
        assert!(results[i].0 < results[i + 1].0);
    }
    Ok(())
}

#[test]
fn range_respects_tombstones() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Config::default())?;

    engine.set("a", b"1".to_vec())?;
    engine.set("b", b"2".to_vec())?;
    engine.set("c", b"3".to_vec())?;
    engine.delete("b")?;

    let results = engine.range("", "\u{10FFFF}")?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "a");
    assert_eq!(results[1].0, "c");
    Ok(())
}

#[test]
fn range_with_no_matches_is_empty() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Config::default())?;

    engine.set("a", b"1".to_vec())?;

    let results = engine.range("x", "z")?;
    assert!(results.is_empty());
    Ok(())
}

// --------------------- Read path priority ---------------------

#[test]
fn read_path_prefers_shallow_level_over_deep() -> Result<()> {
    let dir = tempdir()?;
    let cfg = Config {
        level0_max_files: 1000,
        ..tiny_flush_config()
    };
    let mut engine = Engine::open(dir.path(), cfg)?;

    engine.set("key", b"old".to_vec())?;
    for i in 0..30u64 {
        engine.set(format!("pad{i:04}"), b"x".to_vec())?;
    }

    assert!(
        engine.stats().per_level_file_counts[0] > 1,
        "need multiple level-0 tables for compaction"
    );
    engine.compact_level(0)?;
    assert_eq!(engine.stats().per_level_file_counts[1], 1);
    assert_eq!(engine.stats().per_level_file_counts[0], 0);

    // A newer value for "key" lands in the memtable (or level 0 once
    // flushed); the older value sits compacted at level 1.
    engine.set("key", b"new".to_vec())?;

    assert_eq!(
        engine.get("key")?.expect("key should exist"),
        b"new",
        "memtable/level0 should shadow level1"
    );
    Ok(())
}
