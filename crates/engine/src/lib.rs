//! # Engine
//!
//! The central orchestrator tying [`memtable`], [`wal`], and [`sstable`]
//! together into a single embedded, leveled LSM key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append → MemTable insert       │
//! │              |                                │
//! │              |  (mem_max_bytes exceeded?)      │
//! │              v            yes                 │
//! │           flush() → new level0_<seq>.st        │
//! │              |                                │
//! │              |  (level0 count >= trigger?)    │
//! │              v            yes                 │
//! │           compact_level(0) → level1 (cascades) │
//! │                                               │
//! │ read.rs → MemTable → level0 → deeper levels    │
//! │            (first definite answer wins)        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                               |
//! |----------------|--------------------------------------------------------|
//! | [`lib.rs`]     | `Engine` struct, `open`, accessors, `Debug`, `Drop`     |
//! | [`recovery`]   | Directory scan, WAL replay, stray tmp-file cleanup      |
//! | [`write`]      | `set()`, `delete()`, `force_flush()`, internal `flush()`|
//! | [`read`]       | `get()`, `range()`                                      |
//! | [`compaction`] | `compact_level()` with streaming merge + tombstone GC   |
//!
//! ## Levels
//!
//! ```text
//! ┌────────────────────────────┐  ← freshest, checked first
//! │ MEMTABLE                   │
//! ├────────────────────────────┤  ← from flushes (may overlap)
//! │ LEVEL 0                    │
//! ├────────────────────────────┤  ← from compaction (disjoint, ≤ 1 file)
//! │ LEVEL 1 .. LEVEL Lmax - 1   │
//! └────────────────────────────┘
//! ```
//!
//! ## Crash Safety
//!
//! Every write is appended to the WAL **before** the memtable is mutated.
//! The WAL is only truncated after a flushed sorted table has been renamed
//! into place (atomic temp file + rename + fsync, see
//! [`sstable::SSTableWriter`]). A crash never leaves a half-written `.st`
//! file visible to recovery -- it only ever leaves a `.st.tmp` file, which
//! [`Engine::open`] sweeps on the next start.
mod compaction;
mod read;
mod recovery;
mod write;

use anyhow::Result;
use config::Config;
use memtable::MemTable;
use sstable::SSTableReader;
use std::path::{Path, PathBuf};
use wal::WalWriter;

/// Name of the write-ahead log within the engine's data directory.
pub const WAL_FILENAME: &str = "wal.log";

/// Aggregate engine statistics, as returned by [`Engine::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Approximate byte size of the current (unflushed) memtable.
    pub memtable_bytes: usize,
    /// Number of sorted tables at each level, indexed by level number.
    pub per_level_file_counts: Vec<usize>,
    /// Total entry count recorded in each level's tables' footers, indexed
    /// by level number. Does not deduplicate keys across levels -- only
    /// the read/range path does that.
    pub per_level_entry_counts: Vec<usize>,
}

/// The embedded, single-process, leveled LSM key-value engine.
///
/// # Write Path
///
/// 1. Allocate the next sequence number.
/// 2. Append the record to the WAL (durable before returning).
/// 3. Apply the mutation to the in-memory [`MemTable`].
/// 4. If `mem.approx_bytes() >= config.mem_max_bytes`, flush to a new
///    level-0 sorted table, truncate the WAL, and reset the memtable.
///
/// # Read Path
///
/// 1. Check the memtable (freshest, includes tombstones).
/// 2. Check level 0, newest file to oldest (files there may overlap).
/// 3. Check each deeper level in order, probing only tables whose key
///    range contains the lookup key.
/// 4. The first definite answer -- a value, or a tombstone meaning
///    "absent" -- wins.
///
/// # Recovery
///
/// [`Engine::open`] scans the data directory for `level<L>_<seq>.st`
/// files, groups them by level, and replays the WAL into a fresh
/// memtable.
pub struct Engine {
    dir: PathBuf,
    pub(crate) mem: MemTable,
    pub(crate) wal: WalWriter,
    /// `levels[0]` is level 0 (may overlap, newest-first). `levels[L]` for
    /// `L >= 1` holds pairwise-disjoint tables sorted by key range.
    pub(crate) levels: Vec<Vec<SSTableReader>>,
    pub(crate) next_seq: u64,
    pub(crate) config: Config,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.dir)
            .field("next_seq", &self.next_seq)
            .field("memtable_bytes", &self.mem.approx_bytes())
            .field("memtable_entries", &self.mem.len())
            .field(
                "per_level_file_counts",
                &self.levels.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Opens (or creates) an engine over `dir`, replaying the WAL and
    /// loading every `level<L>_<seq>.st` file found there.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create `dir` if it does not exist.
    /// 2. Sweep leftover `*.st.tmp` files from an interrupted flush or
    ///    compaction.
    /// 3. Scan `dir` for `level<L>_<seq>.st` files, open a reader for
    ///    each, and group them by level.
    /// 4. Replay the WAL into a fresh memtable, assigning each surviving
    ///    record a fresh sequence number above the highest one found on
    ///    disk.
    /// 5. Open a fresh WAL writer in durable (fsync-on-append) mode.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation, the directory
    /// cannot be created or scanned, or any sorted table on disk fails to
    /// open (bad magic, truncated footer, or a level index `>=
    /// config.levels_max`).
    pub fn open<P: AsRef<Path>>(dir: P, config: Config) -> Result<Self> {
        let config = config.validated()?;
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        recovery::cleanup_tmp_files(&dir);

        let (levels, max_seq_on_disk) = recovery::load_levels(&dir, config.levels_max)?;

        let wal_path = dir.join(WAL_FILENAME);
        let mut mem = MemTable::new();
        let next_seq = recovery::replay_wal(&wal_path, &mut mem, max_seq_on_disk + 1)?;

        let wal = WalWriter::create(&wal_path, true)?;

        tracing::info!(
            dir = %dir.display(),
            levels = levels.len(),
            next_seq,
            "engine opened"
        );

        Ok(Self {
            dir,
            mem,
            wal,
            levels,
            next_seq,
            config,
        })
    }

    /// The data directory this engine was opened over.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The next sequence number that will be assigned to a write.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Returns the engine's active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a snapshot of the engine's current size and shape.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            memtable_bytes: self.mem.approx_bytes(),
            per_level_file_counts: self.levels.iter().map(Vec::len).collect(),
            per_level_entry_counts: self
                .levels
                .iter()
                .map(|level| level.iter().map(SSTableReader::len).sum())
                .collect(),
        }
    }

    /// Closes the engine, releasing the WAL and every sorted table
    /// reader.
    ///
    /// On-disk state is unchanged by `close` -- a subsequent
    /// [`Engine::open`] recovers identical state (modulo the best-effort
    /// flush performed by [`Drop`]).
    pub fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }

    pub(crate) fn allocate_seq(&mut self) -> Result<u64> {
        let seq = self.next_seq;
        self.next_seq = self
            .next_seq
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("sequence number overflow (u64::MAX reached)"))?;
        Ok(seq)
    }
}

/// Flushes a non-empty memtable on drop so the next open does not have to
/// replay the WAL to recover its contents.
///
/// This is a convenience, not a correctness requirement -- every write is
/// already durable in the WAL, and replay reconstructs identical state
/// either way. Errors are silently dropped; `Drop` cannot propagate them
/// and the data is safe regardless.
impl Drop for Engine {
    fn drop(&mut self) {
        if !self.mem.is_empty() {
            if let Err(e) = self.flush() {
                tracing::warn!(error = %e, "best-effort flush on drop failed");
            }
        }
    }
}
