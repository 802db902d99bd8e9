use anyhow::{bail, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use memtable::{Entry, MemTable};
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use crate::format::{self, BlockHandle, Footer};

/// Writes immutable sorted tables to disk.
///
/// The writer is stateless -- all work happens in the static methods below.
/// Writes are crash-safe: data lands in a `.tmp` file next to the target,
/// is fsynced, and only then atomically renamed into place. If the process
/// crashes mid-write the `.tmp` file is left behind and ignored by recovery.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Flushes a [`MemTable`] to a new sorted-table file at `path`.
    ///
    /// # Errors
    /// Returns an error if the memtable is empty, or on any I/O failure.
    pub fn write_from_memtable(path: &Path, mem: &MemTable, block_size_bytes: usize) -> Result<()> {
        if mem.is_empty() {
            bail!("refusing to write an empty sorted table (empty memtable)");
        }
        let iter = mem.iter().map(|(k, e)| (k.to_string(), e.clone()));
        Self::write_from_iterator(path, iter, block_size_bytes)
    }

    /// Writes a sorted table from an iterator of `(key, Entry)` pairs.
    ///
    /// This is the streaming compaction entry point: entries are consumed
    /// and written one block at a time, so memory use stays proportional to
    /// a single block plus the index, not the whole dataset.
    ///
    /// `iter` must yield entries in strictly ascending key order -- callers
    /// (flush, compaction merge) are responsible for that ordering and for
    /// deduplicating repeated keys before calling this.
    ///
    /// # Errors
    /// Returns an error if the iterator yields zero entries or on I/O failure.
    pub fn write_from_iterator<I>(path: &Path, iter: I, block_size_bytes: usize) -> Result<()>
    where
        I: Iterator<Item = (String, Entry)>,
    {
        let block_size_bytes = block_size_bytes.max(1);
        let tmp_path = tmp_path_for(path);
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut file = BufWriter::new(raw_file);

        let mut block_handles: Vec<BlockHandle> = Vec::new();
        let mut block_buf: Vec<u8> = Vec::new();
        let mut block_start_key: Option<String> = None;
        let mut block_end_key: Option<String> = None;

        let mut entry_count: u64 = 0;
        let mut min_key: Option<String> = None;
        let mut max_key: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (key, entry) in iter {
            if let Some(prev) = &last_key {
                if key <= *prev {
                    drop(file);
                    let _ = std::fs::remove_file(&tmp_path);
                    bail!(
                        "out-of-order entries given to sorted-table writer: {:?} did not sort after {:?}",
                        key,
                        prev
                    );
                }
            }
            last_key = Some(key.clone());

            let mut record = Vec::with_capacity(16 + key.len());
            record.write_u32::<LittleEndian>(key.len() as u32)?;
            record.extend_from_slice(key.as_bytes());
            record.write_u64::<LittleEndian>(entry.seq)?;
            match &entry.value {
                Some(v) => {
                    record.write_u8(0)?; // 0 = live value
                    record.write_u32::<LittleEndian>(v.len() as u32)?;
                    record.extend_from_slice(v);
                }
                None => {
                    record.write_u8(1)?; // 1 = tombstone
                }
            }

            if !block_buf.is_empty() && block_buf.len() + record.len() > block_size_bytes {
                flush_block(
                    &mut file,
                    &mut block_buf,
                    block_start_key.take().expect("non-empty block has a start key"),
                    block_end_key.clone().expect("non-empty block has an end key"),
                    &mut block_handles,
                )?;
            }

            if block_buf.is_empty() {
                block_start_key = Some(key.clone());
            }
            block_end_key = Some(key.clone());
            block_buf.extend_from_slice(&record);

            if min_key.is_none() {
                min_key = Some(key.clone());
            }
            max_key = Some(key);
            entry_count += 1;
        }

        if entry_count == 0 {
            drop(file);
            let _ = std::fs::remove_file(&tmp_path);
            bail!("refusing to write an empty sorted table (no entries)");
        }

        if !block_buf.is_empty() {
            flush_block(
                &mut file,
                &mut block_buf,
                block_start_key.take().expect("non-empty block has a start key"),
                block_end_key.take().expect("non-empty block has an end key"),
                &mut block_handles,
            )?;
        }

        let index_offset = file.stream_position()?;
        for handle in &block_handles {
            format::write_block_handle(&mut file, handle)?;
        }
        let index_size = file.stream_position()? - index_offset;

        format::write_footer(
            &mut file,
            &Footer {
                entry_count,
                block_count: block_handles.len() as u64,
                index_offset,
                index_size,
                min_key: min_key.expect("at least one entry was written"),
                max_key: max_key.expect("at least one entry was written"),
            },
        )?;

        file.flush()?;
        file.into_inner()?.sync_all()?;

        rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn flush_block<W: Write + Seek>(
    file: &mut W,
    block_buf: &mut Vec<u8>,
    start_key: String,
    end_key: String,
    handles: &mut Vec<BlockHandle>,
) -> Result<()> {
    let offset = file.stream_position()?;
    let mut hasher = Crc32::new();
    hasher.update(block_buf);
    let crc = hasher.finalize();

    file.write_all(block_buf)?;
    file.write_u32::<LittleEndian>(crc)?;

    let size = block_buf.len() as u64 + 4;
    handles.push(BlockHandle {
        start_key,
        end_key,
        offset,
        size,
    });
    block_buf.clear();
    Ok(())
}
