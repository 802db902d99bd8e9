//! Compaction: merges a level and the level below it into a single new
//! sorted table one level deeper.
//!
//! Uses [`sstable::MergeIterator`] to walk every source table in sorted
//! key order, resolving duplicate keys by highest sequence number.
//! Tombstones are only physically dropped once they are compacted into
//! the deepest configured level -- at every shallower level a dropped
//! tombstone could silently resurrect a stale value still sitting in an
//! even deeper level.
use anyhow::Result;
use sstable::{MergeIterator, SSTableReader, SSTableWriter};
use std::path::PathBuf;

use crate::recovery::st_filename;
use crate::Engine;

impl Engine {
    /// Compacts `level` and `level + 1` into a single new table at
    /// `level + 1`, replacing both inputs.
    ///
    /// Level 0's tables may overlap; every level at `level + 1` and
    /// deeper holds pairwise-disjoint tables, so the output of this merge
    /// is always a single table. If the resulting table count at
    /// `level + 1` still meets `config.level0_max_files` and there is
    /// room to go deeper, compaction cascades automatically.
    ///
    /// A no-op if both `level` and `level + 1` are already empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `level + 1 >= config.levels_max`, or on I/O
    /// failure while merging, writing, or deleting old files.
    pub fn compact_level(&mut self, level: usize) -> Result<()> {
        let next = level + 1;
        anyhow::ensure!(
            next < self.config.levels_max,
            "cannot compact level {} into nonexistent level {}",
            level,
            next
        );

        let lower = std::mem::take(&mut self.levels[level]);
        let upper = std::mem::take(&mut self.levels[next]);
        if lower.is_empty() && upper.is_empty() {
            return Ok(());
        }

        let old_paths: Vec<PathBuf> = lower
            .iter()
            .chain(upper.iter())
            .map(|r| r.path().to_path_buf())
            .collect();

        let mut sources = Vec::with_capacity(lower.len() + upper.len());
        for reader in lower.iter().chain(upper.iter()) {
            sources.push(reader.iter_all()?.into_iter());
        }
        let merged = MergeIterator::new(sources).collect_all();

        // Release file handles before the files are deleted below.
        drop(lower);
        drop(upper);

        let drop_tombstones = next == self.config.deepest_level();
        let filtered: Vec<_> = merged
            .into_iter()
            .filter(|(_, entry)| !(drop_tombstones && entry.value.is_none()))
            .collect();

        if filtered.is_empty() {
            // Nothing survives the merge -- no new table to install, so the
            // inputs can be removed immediately.
            for path in &old_paths {
                let _ = std::fs::remove_file(path);
            }
            self.levels[level] = Vec::new();
            self.levels[next] = Vec::new();
            tracing::debug!(level, next, "compaction produced no surviving entries");
            return Ok(());
        }

        let file_seq = self.allocate_seq()?;
        let name = st_filename(next, file_seq);
        let path = self.dir().join(&name);
        SSTableWriter::write_from_iterator(&path, filtered.into_iter(), self.config.block_size_bytes)?;
        let reader = SSTableReader::open(&path)?;

        // The new table is durably installed on disk; only now is it safe to
        // remove the inputs it replaces. A crash or I/O error above leaves
        // the pre-existing tables untouched.
        for path in &old_paths {
            let _ = std::fs::remove_file(path);
        }

        self.levels[level] = Vec::new();
        self.levels[next] = vec![reader];

        tracing::debug!(level, next, file = %name, "compacted level");

        if next != self.config.deepest_level() && self.levels[next].len() >= self.config.level0_max_files
        {
            self.compact_level(next)?;
        }

        Ok(())
    }
}
