//! # MemTable
//!
//! An in-memory, sorted, mutable write buffer for the LSM storage engine.
//!
//! The memtable is the first point of contact for every write operation. It
//! buffers recent `SET` and `DELETE` operations in a sorted structure
//! (`BTreeMap`) before they are flushed to immutable on-disk sorted tables.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order (required
//!   for sorted-table flush and for `range`).
//! - **Sequence-number gated**: a write with a sequence number <= the
//!   existing entry's sequence is silently rejected. This makes WAL replay
//!   idempotent: replaying the same prefix twice produces the same state.
//! - **Tombstone support**: deletes are recorded as `Entry { value: None }`.
//! - **Approximate size tracking**: tracks the byte size of keys + values so
//!   the engine can decide when to flush.
//!
//! ## Example
//! ```rust
//! use memtable::MemTable;
//!
//! let mut m = MemTable::new();
//! m.set("hello".to_string(), b"world".to_vec(), 1);
//! assert_eq!(m.get("hello").unwrap().1, b"world".to_vec());
//!
//! m.delete("hello".to_string(), 2);
//! assert!(m.get("hello").is_none());
//! ```

use std::collections::BTreeMap;
use std::ops::Bound::Included;

/// A single entry in the memtable, pairing a sequence number with an
/// optional value.
///
/// - `value == Some(bytes)` -- the key holds a live value.
/// - `value == None` -- the key has been deleted (tombstone).
///
/// Tombstones are retained in the memtable and flushed to sorted tables so
/// that older values in deeper levels are correctly shadowed during reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Monotonically increasing sequence number assigned at write time.
    /// Used purely to resolve recency across the memtable and every sorted
    /// table level during merges -- never persisted as a file name.
    pub seq: u64,
    /// `Some(bytes)` for live values, `None` for tombstones (deletes).
    pub value: Option<Vec<u8>>,
}

impl Entry {
    /// Returns `true` if this entry is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// An ordered, in-memory write buffer backed by a `BTreeMap`.
///
/// The memtable tracks an approximate byte size (keys + values) so the
/// engine can decide when to flush to a sorted table. Sequence numbers gate
/// every mutation: a write with a sequence number <= the existing entry's
/// sequence is silently dropped, which is what makes replaying a WAL twice
/// into a fresh memtable produce identical state.
#[derive(Debug)]
pub struct MemTable {
    map: BTreeMap<String, Entry>,
    approx_bytes: usize,
}

impl MemTable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            approx_bytes: 0,
        }
    }

    /// Inserts a key-value pair with the given sequence number.
    ///
    /// If the key already exists with a **newer or equal** sequence number,
    /// the write is silently ignored (stale-write protection). Otherwise the
    /// old entry is replaced and `approx_bytes` is adjusted: the prior
    /// entry's value contribution is subtracted before the new value's is
    /// added.
    pub fn set(&mut self, key: String, value: Vec<u8>, seq: u64) {
        match self.map.get(&key) {
            Some(old) if old.seq >= seq => return,
            Some(old) => {
                if let Some(ref ov) = old.value {
                    self.approx_bytes = self.approx_bytes.saturating_sub(ov.len());
                }
            }
            None => {
                self.approx_bytes = self.approx_bytes.saturating_add(key.len());
            }
        }

        self.approx_bytes = self.approx_bytes.saturating_add(value.len());
        self.map.insert(
            key,
            Entry {
                seq,
                value: Some(value),
            },
        );
    }

    /// Records a tombstone (delete marker) for the given key.
    ///
    /// A tombstone is stored as `Entry { seq, value: None }`. It shadows any
    /// older value both in the memtable and in sorted tables during reads.
    /// Stale-write protection applies exactly as in [`set`](MemTable::set).
    pub fn delete(&mut self, key: String, seq: u64) {
        match self.map.get(&key) {
            Some(old) if old.seq >= seq => return,
            Some(old) => {
                if let Some(ref ov) = old.value {
                    self.approx_bytes = self.approx_bytes.saturating_sub(ov.len());
                }
            }
            None => {
                self.approx_bytes = self.approx_bytes.saturating_add(key.len());
            }
        }

        self.map.insert(key, Entry { seq, value: None });
    }

    /// Returns `Some((seq, value))` for a live entry, `None` for a missing
    /// key or a tombstone.
    ///
    /// Prefer [`get_entry`](MemTable::get_entry) when the caller needs to
    /// distinguish "key not found" from "key was deleted".
    pub fn get(&self, key: &str) -> Option<(u64, &[u8])> {
        self.map
            .get(key)
            .and_then(|e| e.value.as_deref().map(|v| (e.seq, v)))
    }

    /// Returns the raw [`Entry`] for the given key, if present.
    ///
    /// Unlike [`get`](MemTable::get), this does not filter out tombstones.
    pub fn get_entry(&self, key: &str) -> Option<&Entry> {
        self.map.get(key)
    }

    /// Returns `true` if the memtable contains the given key, including
    /// tombstones.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Returns an iterator over all entries in ascending key order,
    /// including tombstones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns an ascending iterator over entries with `lo <= key <= hi`,
    /// inclusive on both ends, including tombstones.
    ///
    /// `O(log n + r)` where `r` is the number of results, via `BTreeMap`'s
    /// native range query.
    pub fn range<'a>(
        &'a self,
        lo: &'a str,
        hi: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Entry)> {
        self.map
            .range::<str, _>((Included(lo), Included(hi)))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries, including tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the memtable contains zero entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the approximate byte size of all keys and values stored.
    ///
    /// Used by the engine to decide when to flush the memtable to a sorted
    /// table. Tracks key bytes + value bytes; does not include `BTreeMap`
    /// node overhead.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        self.approx_bytes
    }

    /// Removes all entries and resets `approx_bytes` to zero.
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_bytes = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
