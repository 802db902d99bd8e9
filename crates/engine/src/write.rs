//! Write path: `set()`, `delete()`, `force_flush()`, and the internal
//! `flush()`.
//!
//! Every mutation is first appended to the WAL for durability, then
//! applied to the in-memory memtable. When the memtable exceeds
//! `config.mem_max_bytes` it is persisted to a new level-0 sorted table.
use anyhow::Result;
use wal::WalRecord;

use crate::recovery::st_filename;
use crate::Engine;

impl Engine {
    /// Inserts a key-value pair.
    ///
    /// The write is appended to the WAL before it is applied to the
    /// memtable. If the memtable now exceeds `config.mem_max_bytes`, it is
    /// flushed to a new level-0 sorted table.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty, the WAL append fails, or a
    /// triggered flush fails.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        let key = key.into();
        anyhow::ensure!(!key.is_empty(), "key must not be empty");

        let seq = self.allocate_seq()?;
        let ts = now_millis()?;

        self.wal.append(&WalRecord::Set {
            key: key.clone(),
            value: value.clone(),
            ts,
        })?;
        self.mem.set(key, value, seq);

        if self.mem.approx_bytes() >= self.config.mem_max_bytes {
            self.flush()?;
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// A tombstone record is appended to the WAL and inserted into the
    /// memtable, shadowing any older value already flushed to a sorted
    /// table. The tombstone is only physically discarded once compaction
    /// carries it into the deepest level (see [`crate::compaction`]).
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty, the WAL append fails, or a
    /// triggered flush fails.
    pub fn delete(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        anyhow::ensure!(!key.is_empty(), "key must not be empty");

        let seq = self.allocate_seq()?;
        let ts = now_millis()?;

        self.wal.append(&WalRecord::Delete {
            key: key.clone(),
            ts,
        })?;
        self.mem.delete(key, seq);

        if self.mem.approx_bytes() >= self.config.mem_max_bytes {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces a flush of the current memtable to a new level-0 sorted
    /// table, even if `config.mem_max_bytes` has not been reached.
    ///
    /// A no-op if the memtable is empty.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure while writing the sorted table or
    /// truncating the WAL.
    pub fn force_flush(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }
        self.flush()
    }

    /// Internal flush implementation.
    ///
    /// # Steps
    ///
    /// 1. Write the memtable to `level0_<next_seq>.st` (atomic temp file +
    ///    rename, see [`sstable::SSTableWriter`]).
    /// 2. Truncate the WAL to zero bytes and reopen it for appending.
    /// 3. Replace the memtable with an empty one.
    /// 4. Open the new table and insert it at the front of level 0
    ///    (newest first).
    /// 5. If level 0 has reached `config.level0_max_files`, trigger
    ///    compaction of level 0 into level 1 (which may itself cascade
    ///    into deeper levels).
    pub(crate) fn flush(&mut self) -> Result<()> {
        let file_seq = self.allocate_seq()?;
        let name = st_filename(0, file_seq);
        let path = self.dir().join(&name);

        sstable::SSTableWriter::write_from_memtable(&path, &self.mem, self.config.block_size_bytes)?;

        self.wal.truncate()?;
        self.mem.clear();

        let reader = sstable::SSTableReader::open(&path)?;
        self.levels[0].insert(0, reader);

        tracing::debug!(file = %name, "flushed memtable to level 0");

        if self.levels[0].len() >= self.config.level0_max_files {
            self.compact_level(0)?;
        }

        Ok(())
    }
}

fn now_millis() -> Result<u64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_millis() as u64)
}
