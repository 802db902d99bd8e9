//! Read path: `get()` and `range()`.
//!
//! Point lookups check the memtable first (freshest, may hold a
//! tombstone), then level 0 newest-file-to-oldest (files there may
//! overlap), then each deeper level in order, probing only tables whose
//! key range contains the lookup key. The first definite answer -- a
//! value, or a tombstone meaning "absent" -- wins.
//!
//! Range scans merge every source by key, keeping the highest-sequence
//! entry per key, then drop tombstones before returning.
use anyhow::Result;
use memtable::Entry;
use std::collections::BTreeMap;

use crate::Engine;

impl Engine {
    /// Looks up a key, returning its live value if present.
    ///
    /// # Errors
    ///
    /// Returns an error if reading any sorted table fails (corruption,
    /// I/O).
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.mem.get_entry(key) {
            return Ok(entry.value.clone());
        }

        for level in &self.levels {
            for table in level {
                if key < table.min_key() || key > table.max_key() {
                    continue;
                }
                if let Some(entry) = table.get(key)? {
                    return Ok(entry.value);
                }
            }
        }

        Ok(None)
    }

    /// Returns every live key-value pair with `lo <= key <= hi`, in
    /// ascending key order.
    ///
    /// Merges the memtable and every level, keeping the highest-sequence
    /// entry seen for each key, then filters out tombstones. `lo`/`hi`
    /// are both inclusive; pass `""` for `lo` to scan from the beginning
    /// and a maximal string for `hi` to scan to the end.
    ///
    /// # Errors
    ///
    /// Returns an error if reading any sorted table fails.
    pub fn range(&self, lo: &str, hi: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut merged: BTreeMap<String, Entry> = BTreeMap::new();
        let mut merge_in = |key: String, entry: Entry| match merged.get(&key) {
            Some(existing) if existing.seq >= entry.seq => {}
            _ => {
                merged.insert(key, entry);
            }
        };

        for (key, entry) in self.mem.range(lo, hi) {
            merge_in(key.to_string(), entry.clone());
        }

        for level in &self.levels {
            for table in level {
                if table.max_key() < lo || table.min_key() > hi {
                    continue;
                }
                for (key, entry) in table.range(lo, hi)? {
                    merge_in(key, entry);
                }
            }
        }

        Ok(merged
            .into_iter()
            .filter_map(|(key, entry)| entry.value.map(|v| (key, v)))
            .collect())
    }
}
