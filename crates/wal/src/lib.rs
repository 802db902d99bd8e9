//! # Write-Ahead Log
//!
//! A durability log for the LSM storage engine. Every mutation (`SET` or
//! `DELETE`) is appended here before it is applied to the in-memory write
//! buffer, so that a crash between the two can always be recovered by
//! replaying the log from the start.
//!
//! ## Wire format
//! One JSON object per line (line-delimited JSON, a.k.a. JSONL):
//!
//! ```text
//! {"op":"SET","key":"hello","value":[119,111,114,108,100],"ts":1732000000000}
//! {"op":"DELETE","key":"hello","ts":1732000000123}
//! ```
//!
//! `value` is the raw byte payload, encoded as a JSON array of `u8` (so the
//! log stays plain text without pulling in a base64 dependency). `ts` is a
//! millisecond timestamp, stamped by the caller at write time -- the log
//! itself does not interpret it.
//!
//! ## Crash consistency
//! A process can be killed mid-`write(2)`, leaving a partial final line. On
//! replay, the first line that fails to parse as a complete `WalRecord` is
//! treated as that partial write: replay stops there and returns everything
//! read so far, rather than erroring. This makes replaying a WAL that was
//! truncated by a crash behave identically to replaying one that was closed
//! cleanly up to that point.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// A single durable write-ahead log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum WalRecord {
    /// A `SET key = value` mutation.
    #[serde(rename = "SET")]
    Set {
        key: String,
        value: Vec<u8>,
        ts: u64,
    },
    /// A `DELETE key` mutation (tombstone).
    #[serde(rename = "DELETE")]
    Delete { key: String, ts: u64 },
}

impl WalRecord {
    /// The key this record mutates.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            WalRecord::Set { key, .. } => key,
            WalRecord::Delete { key, .. } => key,
        }
    }

    /// The millisecond timestamp this record was stamped with.
    #[must_use]
    pub fn ts(&self) -> u64 {
        match self {
            WalRecord::Set { ts, .. } => *ts,
            WalRecord::Delete { ts, .. } => *ts,
        }
    }
}

/// Errors surfaced by [`WalWriter`] and [`WalReader`].
///
/// Malformed trailing records are not an error -- see the module docs --
/// so this only covers genuine I/O failure (permissions, missing file, disk
/// full, etc).
#[derive(Debug, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Appends [`WalRecord`]s to a log file.
///
/// When constructed with `sync_on_write = true`, every [`append`](WalWriter::append)
/// fsyncs before returning, so the caller can treat the append as durable
/// immediately. With `false`, records are only flushed to the OS page cache
/// on each append; call [`sync_to_disk`](WalWriter::sync_to_disk) to force
/// durability (e.g. on a batching or timed schedule).
pub struct WalWriter {
    file: BufWriter<File>,
    sync_on_write: bool,
}

impl WalWriter {
    /// Opens `path` for appending, creating it if it does not exist.
    pub fn create<P: AsRef<Path>>(path: P, sync_on_write: bool) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            sync_on_write,
        })
    }

    /// Serializes `record` as one JSON line and appends it.
    ///
    /// Flushes the internal buffer unconditionally. Additionally fsyncs if
    /// this writer was constructed with `sync_on_write = true`.
    pub fn append(&mut self, record: &WalRecord) -> Result<(), WalError> {
        let mut line = serde_json::to_vec(record).expect("WalRecord always serializes");
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        if self.sync_on_write {
            self.file.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Forces any buffered data out to stable storage.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    /// Truncates the log to zero bytes, in place.
    ///
    /// Called once a memtable flush has made the log's contents
    /// redundant (everything in it is now durable in a sorted table).
    /// The file stays open in append mode, so the next
    /// [`append`](WalWriter::append) lands at the new (empty) end of
    /// file with no reopen required.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.get_ref().set_len(0)?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }
}

/// Replays [`WalRecord`]s from a log, in the order they were appended.
pub struct WalReader<R> {
    reader: BufReader<R>,
}

impl WalReader<File> {
    /// Opens `path` for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }
}

impl<R: Read> WalReader<R> {
    /// Wraps an arbitrary reader (useful for tests and in-memory buffers).
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Replays every well-formed record, invoking `f` for each in order.
    ///
    /// Stops -- without error -- at the first line that is not valid JSON or
    /// does not deserialize into a [`WalRecord`]; this is how a partially
    /// written final line (from a crash mid-append) is tolerated. A blank
    /// trailing line (e.g. the file's final newline) is skipped silently.
    ///
    /// Returns `Ok(true)` if replay stopped early because of an unparseable
    /// trailing record, `Ok(false)` if it ran to a clean EOF. Callers that
    /// want to log a diagnostic for the corrupt-tail case (as the engine
    /// does) can match on this without re-parsing anything themselves.
    pub fn replay<F: FnMut(WalRecord)>(&mut self, mut f: F) -> Result<bool, WalError> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                return Ok(false); // clean EOF
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => f(record),
                Err(_) => return Ok(true), // truncated / corrupt tail: stop here
            }
        }
    }
}
