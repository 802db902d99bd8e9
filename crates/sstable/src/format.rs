//! Sorted-table binary format: constants, block-handle encoding, and the
//! variable-length footer.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ DATA BLOCK 0                                                │
//! │   record*: key_len(u32) | key | seq(u64) | tombstone(u8)    │
//! │            | [val_len(u32) | val]                           │
//! │   crc32(u32) over every record byte in this block            │
//! ├────────────────────────────────────────────────────────────┤
//! │ DATA BLOCK 1 ...                                             │
//! ├────────────────────────────────────────────────────────────┤
//! │ INDEX                                                        │
//! │   entry* (one per data block, in ascending key order):        │
//! │     start_key_len(u32) | start_key | end_key_len(u32)        │
//! │     | end_key | offset(u64) | size(u64)                      │
//! ├────────────────────────────────────────────────────────────┤
//! │ FOOTER (variable length)                                     │
//! │   magic(u32) | entry_count(u64) | block_count(u64)           │
//! │   | index_offset(u64) | index_size(u64)                      │
//! │   | min_key_len(u32) | min_key | max_key_len(u32) | max_key   │
//! ├────────────────────────────────────────────────────────────┤
//! │ footer_len(u32) -- always the last 4 bytes of the file        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Keys are UTF-8 strings, length-prefixed
//! like byte blobs. `size` in a block handle includes the trailing CRC32.
//! The footer is variable length (it embeds `min_key`/`max_key`), so the
//! reader locates it by reading the fixed 4-byte trailer at EOF first.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Result as IoResult, Seek, SeekFrom, Write};

/// Magic number identifying this sorted-table format (ASCII "LSTB").
pub const MAGIC: u32 = 0x4C53_5442;

/// A block's location plus the inclusive key range it covers.
///
/// Stored in the index section so point reads and range scans can decide,
/// without touching the data section, whether a block can possibly contain
/// a given key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHandle {
    pub start_key: String,
    pub end_key: String,
    pub offset: u64,
    /// Byte length of the block, including its trailing CRC32.
    pub size: u64,
}

pub fn write_block_handle<W: Write>(w: &mut W, handle: &BlockHandle) -> IoResult<()> {
    write_len_prefixed_str(w, &handle.start_key)?;
    write_len_prefixed_str(w, &handle.end_key)?;
    w.write_u64::<LittleEndian>(handle.offset)?;
    w.write_u64::<LittleEndian>(handle.size)?;
    Ok(())
}

pub fn read_block_handle<R: Read>(r: &mut R) -> IoResult<BlockHandle> {
    let start_key = read_len_prefixed_str(r)?;
    let end_key = read_len_prefixed_str(r)?;
    let offset = r.read_u64::<LittleEndian>()?;
    let size = r.read_u64::<LittleEndian>()?;
    Ok(BlockHandle {
        start_key,
        end_key,
        offset,
        size,
    })
}

pub fn write_len_prefixed_str<W: Write>(w: &mut W, s: &str) -> IoResult<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub fn read_len_prefixed_str<R: Read>(r: &mut R) -> IoResult<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// The fully parsed footer of a sorted-table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub entry_count: u64,
    pub block_count: u64,
    pub index_offset: u64,
    pub index_size: u64,
    pub min_key: String,
    pub max_key: String,
}

/// Writes the footer body, then the 4-byte trailing length that lets a
/// reader find it from EOF. Returns the total number of bytes written
/// (footer body + trailer).
pub fn write_footer<W: Write + Seek>(w: &mut W, footer: &Footer) -> IoResult<u64> {
    let start = w.stream_position()?;
    w.write_u32::<LittleEndian>(MAGIC)?;
    w.write_u64::<LittleEndian>(footer.entry_count)?;
    w.write_u64::<LittleEndian>(footer.block_count)?;
    w.write_u64::<LittleEndian>(footer.index_offset)?;
    w.write_u64::<LittleEndian>(footer.index_size)?;
    write_len_prefixed_str(w, &footer.min_key)?;
    write_len_prefixed_str(w, &footer.max_key)?;
    let end = w.stream_position()?;
    let footer_len = (end - start) as u32;
    w.write_u32::<LittleEndian>(footer_len)?;
    Ok(end - start + 4)
}

/// Locates and parses the footer of an open sorted-table file.
///
/// Strategy: read the final 4 bytes (the trailer) to learn the footer's
/// byte length, then seek back that far plus 4 and parse the footer body.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> IoResult<Footer> {
    let filesize = r.seek(SeekFrom::End(0))?;
    if filesize < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "file too small to contain a footer trailer",
        ));
    }

    r.seek(SeekFrom::End(-4))?;
    let footer_len = r.read_u32::<LittleEndian>()? as u64;
    if filesize < footer_len + 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "footer_len larger than the file itself",
        ));
    }

    r.seek(SeekFrom::End(-((footer_len + 4) as i64)))?;
    let magic = r.read_u32::<LittleEndian>()?;
    if magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected sorted-table magic: {:#x}", magic),
        ));
    }
    let entry_count = r.read_u64::<LittleEndian>()?;
    let block_count = r.read_u64::<LittleEndian>()?;
    let index_offset = r.read_u64::<LittleEndian>()?;
    let index_size = r.read_u64::<LittleEndian>()?;
    let min_key = read_len_prefixed_str(r)?;
    let max_key = read_len_prefixed_str(r)?;

    Ok(Footer {
        entry_count,
        block_count,
        index_offset,
        index_size,
        min_key,
        max_key,
    })
}
