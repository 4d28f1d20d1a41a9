//! Binary layout of the archive container: the fixed 32-byte archive header
//! and the variable-length per-file header that precedes every member body.

use crate::error::{ArchiveError, Result};
use crate::io::{
    read_exact, read_u16_le, read_u32_le, read_u64_le, seek_abs, seek_end, tell, write_all,
    write_u16_le, write_u32_le, write_u64_le,
};
use std::io::{Read, Seek, Write};

/// ASCII `ARCH`.
pub const MAGIC: [u8; 4] = *b"ARCH";

/// Only format version this crate writes or accepts.
pub const VERSION: u16 = 1;

/// Reserved bytes in the archive header. Fixed at 22 so the header totals 32
/// bytes exactly (magic 4 + version 2 + file_count 4 + reserved 22 = 32).
pub const RESERVED_LEN: usize = 22;

/// Total size of the archive header on disk.
pub const ARCHIVE_HEADER_SIZE: u64 = 4 + 2 + 4 + RESERVED_LEN as u64;

/// Offset of the `file_count` field within the archive header, used when
/// patching the count on close.
pub const FILE_COUNT_OFFSET: u64 = 6;

/// Bit 0 of the file header's `flags` byte: member body is DEFLATE-compressed.
pub const FLAG_COMPRESSED: u8 = 1;

/// Fixed-width prefix of a file header (everything before the name).
const FILE_HEADER_PREFIX_LEN: u64 = 2 + 8 + 8 + 4 + 4 + 1;

/// The 32-byte header at the start of every archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub version: u16,
    pub file_count: u32,
}

impl ArchiveHeader {
    pub fn new() -> Self {
        Self {
            version: VERSION,
            file_count: 0,
        }
    }

    /// Write the header at the stream's current position.
    pub fn write_to(&self, stream: &mut impl Write) -> Result<()> {
        write_all(stream, &MAGIC)?;
        write_u16_le(stream, self.version)?;
        write_u32_le(stream, self.file_count)?;
        write_all(stream, &[0u8; RESERVED_LEN])?;
        Ok(())
    }

    /// Read and validate the header from the stream's current position.
    pub fn read_from(stream: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact(stream, &mut magic)?;
        if magic != MAGIC {
            return Err(ArchiveError::BadMagic);
        }

        let version = read_u16_le(stream)?;
        if version != VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let file_count = read_u32_le(stream)?;

        // Reserved bytes: skip, never validate.
        let mut reserved = [0u8; RESERVED_LEN];
        read_exact(stream, &mut reserved)?;

        Ok(Self {
            version,
            file_count,
        })
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Seek to the archive header's `file_count` field, overwrite it, and return
/// the stream to end-of-file. Flushes before and after the patch seek so
/// mixed reads/writes on the same handle stay well-defined.
pub fn patch_file_count(stream: &mut (impl Write + Seek), file_count: u32) -> Result<()> {
    stream.flush()?;
    seek_abs(stream, FILE_COUNT_OFFSET)?;
    write_u32_le(stream, file_count)?;
    stream.flush()?;
    seek_end(stream)?;
    Ok(())
}

/// Per-member header: fixed 27-byte prefix followed by the raw name bytes.
/// `comp_size`, `crc32_uncompressed`, and `crc32_compressed` are written as
/// placeholders and back-patched once the body has been streamed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub orig_size: u64,
    pub comp_size: u64,
    pub crc32_uncompressed: u32,
    pub crc32_compressed: u32,
    pub flags: u8,
}

impl FileHeader {
    pub fn new(orig_size: u64, compressed: bool) -> Self {
        Self {
            orig_size,
            comp_size: 0,
            crc32_uncompressed: 0,
            crc32_compressed: 0,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Absolute offsets of the three back-patchable fields, returned by
/// `write_file_header` so the writer can patch them once the body is known.
#[derive(Debug, Clone, Copy)]
pub struct FileHeaderPatchOffsets {
    pub comp_size: u64,
    pub crc32_uncompressed: u64,
    pub crc32_compressed: u64,
}

/// Write a file header (with placeholder `comp_size`/CRCs) at the stream's
/// current position, returning the offsets of those placeholders.
pub fn write_file_header(
    stream: &mut (impl Write + Seek),
    header: &FileHeader,
    name: &str,
) -> Result<FileHeaderPatchOffsets> {
    let name_bytes = name.as_bytes();
    if name_bytes.is_empty() {
        return Err(ArchiveError::InvalidArgument(
            "file header name must not be empty".to_string(),
        ));
    }
    if name_bytes.len() > u16::MAX as usize {
        return Err(ArchiveError::NameTooLong(name_bytes.len()));
    }

    write_u16_le(stream, name_bytes.len() as u16)?;
    write_u64_le(stream, header.orig_size)?;

    let comp_size_offset = tell(stream)?;
    write_u64_le(stream, 0)?;

    let crc32_uncompressed_offset = tell(stream)?;
    write_u32_le(stream, 0)?;

    let crc32_compressed_offset = tell(stream)?;
    write_u32_le(stream, 0)?;

    write_all(stream, &[header.flags])?;
    write_all(stream, name_bytes)?;

    Ok(FileHeaderPatchOffsets {
        comp_size: comp_size_offset,
        crc32_uncompressed: crc32_uncompressed_offset,
        crc32_compressed: crc32_compressed_offset,
    })
}

/// Back-patch `comp_size` once the body has been fully streamed, restoring
/// the end-of-file position afterward.
pub fn patch_file_header_comp_size(
    stream: &mut (impl Write + Seek),
    offsets: &FileHeaderPatchOffsets,
    comp_size: u64,
) -> Result<()> {
    stream.flush()?;
    seek_abs(stream, offsets.comp_size)?;
    write_u64_le(stream, comp_size)?;
    stream.flush()?;
    seek_end(stream)?;
    Ok(())
}

/// Back-patch both CRC-32 fields, restoring the end-of-file position
/// afterward.
pub fn patch_file_header_crcs(
    stream: &mut (impl Write + Seek),
    offsets: &FileHeaderPatchOffsets,
    crc32_uncompressed: u32,
    crc32_compressed: u32,
) -> Result<()> {
    stream.flush()?;
    seek_abs(stream, offsets.crc32_uncompressed)?;
    write_u32_le(stream, crc32_uncompressed)?;
    write_u32_le(stream, crc32_compressed)?;
    stream.flush()?;
    seek_end(stream)?;
    Ok(())
}

/// Read a file header and its name from the stream's current position.
pub fn read_file_header(stream: &mut impl Read) -> Result<(FileHeader, String)> {
    let name_length = read_u16_le(stream)?;
    if name_length == 0 {
        return Err(ArchiveError::Corrupted(
            "file header name length is zero".to_string(),
        ));
    }

    let orig_size = read_u64_le(stream)?;
    let comp_size = read_u64_le(stream)?;
    let crc32_uncompressed = read_u32_le(stream)?;
    let crc32_compressed = read_u32_le(stream)?;

    let mut flags = [0u8; 1];
    read_exact(stream, &mut flags)?;

    let mut name_buf = vec![0u8; name_length as usize];
    read_exact(stream, &mut name_buf)?;
    let name = String::from_utf8(name_buf)
        .map_err(|e| ArchiveError::Corrupted(format!("invalid UTF-8 in member name: {e}")))?;

    let header = FileHeader {
        orig_size,
        comp_size,
        crc32_uncompressed,
        crc32_compressed,
        flags: flags[0],
    };

    Ok((header, name))
}

/// Size in bytes this header will occupy on disk, fixed prefix plus name.
pub fn file_header_size(name: &str) -> u64 {
    FILE_HEADER_PREFIX_LEN + name.len() as u64
}
