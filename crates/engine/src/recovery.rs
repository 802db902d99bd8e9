//! Directory scan and WAL replay logic -- the engine's cold-start path.
//!
//! Unlike a manifest-backed design, level assignment here is recovered
//! entirely from filenames: every sorted table is named
//! `level<L>_<seq>.st`, so a directory listing plus a filename parse is
//! enough to reconstruct which table belongs to which level and in what
//! order it was produced, with no separate metadata file to keep in sync.
use anyhow::{Context, Result};
use memtable::MemTable;
use sstable::SSTableReader;
use std::path::Path;
use wal::{WalReader, WalRecord};

/// Prefix shared by every sorted table filename: `level<L>_<seq>.st`.
const LEVEL_PREFIX: &str = "level";
const TABLE_SUFFIX: &str = ".st";

/// Parses a sorted-table filename of the form `level<L>_<seq>.st`.
///
/// Returns `None` for anything that doesn't match -- the WAL file, stray
/// `.st.tmp` files, or files left behind by something else entirely. Scans
/// are tolerant of such files; they are simply not loaded.
pub(crate) fn parse_st_filename(name: &str) -> Option<(usize, u64)> {
    let body = name.strip_prefix(LEVEL_PREFIX)?;
    let body = body.strip_suffix(TABLE_SUFFIX)?;
    let (level_str, seq_str) = body.split_once('_')?;
    let level: usize = level_str.parse().ok()?;
    let seq: u64 = seq_str.parse().ok()?;
    Some((level, seq))
}

/// Builds the canonical filename for a level/seq pair.
pub(crate) fn st_filename(level: usize, seq: u64) -> String {
    format!("{LEVEL_PREFIX}{level}_{seq:020}{TABLE_SUFFIX}")
}

/// Removes leftover `*.st.tmp` files from a flush or compaction that was
/// interrupted mid-write. The writer always completes the rename before a
/// table becomes visible, so anything still named `.st.tmp` is guaranteed
/// incomplete and safe to discard.
pub(crate) fn cleanup_tmp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem.ends_with(".st") {
                    if std::fs::remove_file(&path).is_ok() {
                        tracing::debug!(path = %path.display(), "removed stray tmp file");
                    }
                }
            }
        }
    }
}

/// Scans `dir` for `level<L>_<seq>.st` files and groups them by level.
///
/// Returns the populated level vector (sized to `levels_max`, deeper
/// levels empty if nothing has compacted that far yet) and the highest
/// sequence number found in any `level<L>_<seq>.st` filename -- used by
/// the caller to pick a starting sequence number for WAL replay and new
/// writes that is guaranteed to sort after everything already on disk.
/// A table's filename seq is always allocated after every entry it
/// contains (flush/compaction call `allocate_seq` once the merged/flushed
/// entries already hold their seqs), so the filename seq -- not a scan of
/// the table's entries -- is the correct upper bound here.
///
/// Level 0 is sorted newest-seq-first (its tables may overlap in key
/// range, so read order matters); deeper levels are sorted by `min_key`
/// since compaction keeps them pairwise disjoint.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, a table fails to
/// open, or a filename claims a level `>= levels_max`.
pub(crate) fn load_levels(dir: &Path, levels_max: usize) -> Result<(Vec<Vec<SSTableReader>>, u64)> {
    let mut staged: Vec<Vec<(u64, SSTableReader)>> = (0..levels_max).map(|_| Vec::new()).collect();
    let mut max_seq = 0u64;

    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((level, seq)) = parse_st_filename(name) else {
            continue;
        };
        anyhow::ensure!(
            level < levels_max,
            "sorted table {} names level {} but levels_max is {}",
            name,
            level,
            levels_max
        );

        let reader = SSTableReader::open(&path)
            .with_context(|| format!("opening sorted table {}", path.display()))?;
        max_seq = max_seq.max(seq);
        staged[level].push((seq, reader));
    }

    let mut levels = Vec::with_capacity(levels_max);
    for (level, mut tables) in staged.into_iter().enumerate() {
        if level == 0 {
            tables.sort_by(|a, b| b.0.cmp(&a.0)); // newest seq first
        } else {
            tables.sort_by(|a, b| a.1.min_key().cmp(b.1.min_key()));
        }
        levels.push(tables.into_iter().map(|(_, r)| r).collect());
    }

    Ok((levels, max_seq))
}

/// Replays a WAL file into `mem`, assigning each surviving record a fresh
/// sequence number starting at `start_seq` and counting up by one per
/// record.
///
/// Returns the next sequence number available for new writes -- i.e.
/// `start_seq + <records replayed>`.
///
/// If the WAL file does not exist, returns `Ok(start_seq)` (fresh start).
/// If replay stops early because of a corrupt or truncated trailing
/// record, a diagnostic is logged but this is not an error: the WAL's
/// job is exactly to tolerate a crash mid-append, and everything read
/// before the bad line is still applied.
///
/// # Errors
///
/// Propagates any I/O error other than "file not found".
pub(crate) fn replay_wal(path: &Path, mem: &mut MemTable, start_seq: u64) -> Result<u64> {
    let mut reader = match WalReader::open(path) {
        Ok(reader) => reader,
        Err(wal::WalError::Io(ref io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(start_seq);
        }
        Err(e) => return Err(anyhow::anyhow!(e).context("opening WAL for replay")),
    };

    let mut seq = start_seq;
    let mut replayed = 0u64;
    let stopped_early = reader
        .replay(|record| {
            match record {
                WalRecord::Set { key, value, .. } => mem.set(key, value, seq),
                WalRecord::Delete { key, .. } => mem.delete(key, seq),
            }
            seq += 1;
            replayed += 1;
        })
        .map_err(|e| anyhow::anyhow!(e).context("replaying WAL"))?;

    if stopped_early {
        tracing::warn!(
            path = %path.display(),
            replayed,
            "WAL replay stopped early at an unparseable trailing record (likely a crash mid-append)"
        );
    }

    Ok(seq)
}
