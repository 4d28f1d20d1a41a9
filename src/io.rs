//! Byte-level I/O helpers: exact reads/writes, little-endian scalar codec,
//! chunked copying with a rolling CRC-32, and positional seeks.
//!
//! Every multi-byte integer in the archive format is little-endian regardless
//! of host byte order; centralizing the conversions here keeps that invariant
//! in one place instead of scattered across header encode/decode sites.

use crate::error::{ArchiveError, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Chunk size used by `copy_n_with_crc`. The source this format was distilled
/// from tries progressively smaller buffers (64K, 32K, 16K, 8K, 4K) if
/// allocation fails; that's a graceful-degradation strategy for
/// memory-constrained hosts, not a correctness requirement, so a single fixed
/// buffer is used here.
const COPY_CHUNK_SIZE: usize = 16 * 1024;

/// Running CRC-32 accumulator (IEEE 802.3 polynomial, reflected, init 0,
/// final XOR 0xFFFFFFFF — the semantics `crc32fast` already implements).
#[derive(Debug, Default, Clone)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

/// Read exactly `buf.len()` bytes, mapping a short read to `UnexpectedEof`.
pub fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ArchiveError::UnexpectedEof,
        _ => ArchiveError::Io(e),
    })
}

/// Write exactly `buf` to `writer`.
pub fn write_all(writer: &mut impl Write, buf: &[u8]) -> Result<()> {
    writer.write_all(buf)?;
    Ok(())
}

pub fn read_u16_le(reader: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64_le(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_u16_le(writer: &mut impl Write, value: u16) -> Result<()> {
    write_all(writer, &value.to_le_bytes())
}

pub fn write_u32_le(writer: &mut impl Write, value: u32) -> Result<()> {
    write_all(writer, &value.to_le_bytes())
}

pub fn write_u64_le(writer: &mut impl Write, value: u64) -> Result<()> {
    write_all(writer, &value.to_le_bytes())
}

/// Copy exactly `n` bytes from `src` to `dst` in fixed-size chunks, updating
/// `crc` over the bytes as read from `src`. Fails with `UnexpectedEof` if
/// `src` runs dry before `n` bytes are copied.
pub fn copy_n_with_crc(
    src: &mut impl Read,
    dst: &mut impl Write,
    n: u64,
    crc: &mut Crc32,
) -> Result<()> {
    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut remaining = n;
    while remaining > 0 {
        let chunk = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        let slice = &mut buf[..chunk];
        read_exact(src, slice)?;
        crc.update(slice);
        write_all(dst, slice)?;
        remaining -= chunk as u64;
    }
    Ok(())
}

pub fn seek_abs(stream: &mut impl Seek, offset: u64) -> Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}

pub fn tell(stream: &mut impl Seek) -> Result<u64> {
    Ok(stream.seek(SeekFrom::Current(0))?)
}

pub fn seek_end(stream: &mut impl Seek) -> Result<u64> {
    Ok(stream.seek(SeekFrom::End(0))?)
}
