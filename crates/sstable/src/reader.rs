use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::Entry;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::{self, BlockHandle, Footer};

/// Maximum key size we'll allocate while decoding a block (64 KiB). Guards
/// against OOM on a corrupt file.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size we'll allocate while decoding a block (10 MiB).
const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Reads a sorted-table file for point lookups and range scans.
///
/// [`open`](SSTableReader::open) loads only the footer and the block index
/// into memory -- the data blocks stay on disk and are paged in on demand.
/// A persistent file handle is kept open for the reader's lifetime, guarded
/// by a `Mutex` so `get`/`range` work through a shared `&self`.
pub struct SSTableReader {
    path: PathBuf,
    index: Vec<BlockHandle>,
    footer: Footer,
    file: Mutex<BufReader<File>>,
}

impl SSTableReader {
    /// Opens a sorted-table file and loads its footer and block index.
    ///
    /// # Errors
    /// Returns an error if the file is too small, the magic is wrong, or any
    /// I/O operation fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut f = File::open(&path_buf)?;

        let footer = format::read_footer(&mut f)?;

        f.seek(SeekFrom::Start(footer.index_offset))?;
        let mut index = Vec::with_capacity(footer.block_count as usize);
        for _ in 0..footer.block_count {
            index.push(format::read_block_handle(&mut f)?);
        }

        f.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path_buf,
            index,
            footer,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(Some(entry))` if the key exists in this table -- the
    /// entry may be a tombstone (`value: None`). Returns `Ok(None)` if the
    /// key is outside this table's range or not present in any block.
    pub fn get(&self, key: &str) -> Result<Option<Entry>> {
        let block_idx = match self.candidate_block(key) {
            Some(i) => i,
            None => return Ok(None),
        };
        let block = self.read_block(block_idx)?;
        Ok(block.into_iter().find(|(k, _)| k == key).map(|(_, e)| e))
    }

    /// Returns an ascending iterator over entries with `lo <= key <= hi`,
    /// inclusive on both ends, including tombstones.
    pub fn range(&self, lo: &str, hi: &str) -> Result<Vec<(String, Entry)>> {
        let mut out = Vec::new();
        for handle in &self.index {
            if handle.end_key.as_str() < lo {
                continue;
            }
            if handle.start_key.as_str() > hi {
                break;
            }
            let block = self.read_block_at(handle)?;
            for (k, e) in block {
                if k.as_str() >= lo && k.as_str() <= hi {
                    out.push((k, e));
                }
            }
        }
        Ok(out)
    }

    /// Returns every entry in this table, in ascending key order, including
    /// tombstones. Used by compaction to merge tables together.
    pub fn iter_all(&self) -> Result<Vec<(String, Entry)>> {
        let mut out = Vec::with_capacity(self.footer.entry_count as usize);
        for handle in &self.index {
            out.extend(self.read_block_at(handle)?);
        }
        Ok(out)
    }

    /// Binary-searches the block index for the block that could contain
    /// `key`, or `None` if `key` falls outside every block's range.
    fn candidate_block(&self, key: &str) -> Option<usize> {
        if key < self.footer.min_key.as_str() || key > self.footer.max_key.as_str() {
            return None;
        }
        let idx = self
            .index
            .partition_point(|h| h.end_key.as_str() < key);
        match self.index.get(idx) {
            Some(h) if h.start_key.as_str() <= key => Some(idx),
            _ => None,
        }
    }

    fn read_block(&self, idx: usize) -> Result<Vec<(String, Entry)>> {
        self.read_block_at(&self.index[idx])
    }

    fn read_block_at(&self, handle: &BlockHandle) -> Result<Vec<(String, Entry)>> {
        if handle.size < 4 {
            bail!("corrupt block handle: size smaller than trailing crc32");
        }
        let body_len = (handle.size - 4) as usize;

        let mut f = self
            .file
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
        f.seek(SeekFrom::Start(handle.offset))?;

        let mut body = vec![0u8; body_len];
        f.read_exact(&mut body)?;
        let stored_crc = f.read_u32::<LittleEndian>()?;

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let actual_crc = hasher.finalize();
        if actual_crc != stored_crc {
            bail!(
                "crc32 mismatch in data block at offset {}: expected {:#010x}, got {:#010x}",
                handle.offset,
                stored_crc,
                actual_crc
            );
        }

        decode_block(&body)
    }

    /// Total number of entries recorded in this table's footer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.footer.entry_count as usize
    }

    /// Returns `true` if this table has zero entries (never produced by the
    /// writer, but checked defensively).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.footer.entry_count == 0
    }

    /// The smallest key in this table.
    #[must_use]
    pub fn min_key(&self) -> &str {
        &self.footer.min_key
    }

    /// The largest key in this table.
    #[must_use]
    pub fn max_key(&self) -> &str {
        &self.footer.max_key
    }

    /// Number of data blocks in this table.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// The file path this reader was opened from.
    ///
    /// The engine keeps this around so compaction and flush can delete the
    /// underlying file once the reader it belongs to has been replaced.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn decode_block(mut body: &[u8]) -> Result<Vec<(String, Entry)>> {
    let mut out = Vec::new();
    while !body.is_empty() {
        let key_len = body.read_u32::<LittleEndian>()? as usize;
        if key_len > MAX_KEY_BYTES {
            bail!("corrupt block: key_len {} exceeds maximum {}", key_len, MAX_KEY_BYTES);
        }
        let mut key_buf = vec![0u8; key_len];
        body.read_exact(&mut key_buf)?;
        let key = String::from_utf8(key_buf)
            .map_err(|e| anyhow::anyhow!("corrupt block: non-utf8 key: {}", e))?;

        let seq = body.read_u64::<LittleEndian>()?;
        let tombstone = body.read_u8()?;
        let value = if tombstone == 1 {
            None
        } else {
            let val_len = body.read_u32::<LittleEndian>()? as usize;
            if val_len > MAX_VALUE_BYTES {
                bail!("corrupt block: val_len {} exceeds maximum {}", val_len, MAX_VALUE_BYTES);
            }
            let mut val = vec![0u8; val_len];
            body.read_exact(&mut val)?;
            Some(val)
        };

        out.push((key, Entry { seq, value }));
    }
    Ok(out)
}
