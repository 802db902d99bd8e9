//! # Sorted tables
//!
//! Immutable, on-disk storage files for the LSM storage engine.
//!
//! When the in-memory [`memtable::MemTable`] exceeds its size threshold, the
//! engine flushes it to disk as a sorted table. Sorted tables are
//! write-once, read-many -- once created they are never modified, only
//! replaced during compaction.
//!
//! ## File layout
//!
//! Entries are grouped into data blocks sized to a configurable byte
//! target. Each block carries a trailing CRC32 over its own bytes; an index
//! section records each block's key range and file offset so point reads
//! and range scans can skip straight to the relevant block(s) without
//! scanning the whole file. See [`format`] for the exact byte layout.

mod format;
mod merge;
mod reader;
mod writer;

pub use format::{BlockHandle, Footer, MAGIC};
pub use merge::MergeIterator;
pub use reader::SSTableReader;
pub use writer::SSTableWriter;
