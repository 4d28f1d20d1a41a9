//! Streaming bridge to `flate2`'s raw-DEFLATE codec.
//!
//! Mirrors the encoder/decoder loop contract the distilled format was
//! originally built around (see `original_source/src/util/file.c`): the
//! encoder is driven with `FlushCompress::None` until the source is
//! exhausted, then `FlushCompress::Finish`, draining the output buffer after
//! every call; the decoder is driven with `FlushDecompress::None` until it
//! reports `Status::StreamEnd`. CRC-32 accumulation happens alongside the
//! compression loop rather than in a second pass.
//!
//! `Compress`/`Decompress` are used directly (not the `flate2::write`/`read`
//! wrapper types) so the flush discipline stays explicit and the byte
//! accounting (`comp_size`, both CRCs) falls straight out of the loop instead
//! of being reconstructed after the fact.

use crate::error::{ArchiveError, Result};
use crate::io::{read_exact, Crc32};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io::{Read, Write};

const CHUNK_SIZE: usize = 16 * 1024;

/// Compress `input` to EOF, writing the DEFLATE stream to `output`.
///
/// Returns `(comp_size, crc_uncompressed, crc_compressed)`: the number of
/// bytes written to `output`, the CRC-32 of the original bytes read from
/// `input`, and the CRC-32 of the bytes written to `output`.
pub fn compress_stream(input: &mut impl Read, output: &mut impl Write) -> Result<(u64, u32, u32)> {
    let mut compressor = Compress::new(Compression::default(), false);
    let mut in_buf = [0u8; CHUNK_SIZE];
    let mut out_buf = [0u8; CHUNK_SIZE];
    let mut crc_uncompressed = Crc32::new();
    let mut crc_compressed = Crc32::new();
    let mut comp_size: u64 = 0;

    loop {
        let read_bytes = input.read(&mut in_buf)?;
        if read_bytes > 0 {
            crc_uncompressed.update(&in_buf[..read_bytes]);
        }
        let eof = read_bytes == 0;
        let flush = if eof {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };

        let mut offset = 0usize;
        loop {
            let before_in = compressor.total_in();
            let before_out = compressor.total_out();
            let status = compressor
                .compress(&in_buf[offset..read_bytes], &mut out_buf, flush)
                .map_err(|e| ArchiveError::Compression(e.to_string()))?;
            let consumed = (compressor.total_in() - before_in) as usize;
            let produced = (compressor.total_out() - before_out) as usize;

            if produced > 0 {
                crc_compressed.update(&out_buf[..produced]);
                output.write_all(&out_buf[..produced])?;
                comp_size += produced as u64;
            }
            offset += consumed;

            if status == Status::StreamEnd {
                break;
            }
            // Keep draining while the output buffer came back full; stop
            // once input is exhausted and there's nothing left pending.
            if offset >= read_bytes && produced < out_buf.len() {
                break;
            }
        }

        if flush == FlushCompress::Finish {
            break;
        }
    }

    Ok((
        comp_size,
        crc_uncompressed.finalize(),
        crc_compressed.finalize(),
    ))
}

/// Read exactly `comp_size` stored bytes from `input`, inflate them to
/// `output`.
///
/// Returns `(crc_compressed, crc_uncompressed)`: the CRC-32 over the
/// `comp_size` stored bytes as they appear in the archive, and the CRC-32
/// over the expanded output.
pub fn decompress_stream(
    input: &mut impl Read,
    output: &mut impl Write,
    comp_size: u64,
) -> Result<(u32, u32)> {
    let mut decompressor = Decompress::new(false);
    let mut in_buf = [0u8; CHUNK_SIZE];
    let mut out_buf = [0u8; CHUNK_SIZE];
    let mut crc_compressed = Crc32::new();
    let mut crc_uncompressed = Crc32::new();
    let mut total_read: u64 = 0;
    let mut stream_ended = false;

    while total_read < comp_size {
        let to_read = (comp_size - total_read).min(CHUNK_SIZE as u64) as usize;
        read_exact(input, &mut in_buf[..to_read])?;
        crc_compressed.update(&in_buf[..to_read]);
        total_read += to_read as u64;

        let mut offset = 0usize;
        while offset < to_read {
            let before_in = decompressor.total_in();
            let before_out = decompressor.total_out();
            let status = decompressor
                .decompress(&in_buf[offset..to_read], &mut out_buf, FlushDecompress::None)
                .map_err(|e| ArchiveError::Corrupted(e.to_string()))?;
            let consumed = (decompressor.total_in() - before_in) as usize;
            let produced = (decompressor.total_out() - before_out) as usize;

            if produced > 0 {
                crc_uncompressed.update(&out_buf[..produced]);
                output.write_all(&out_buf[..produced])?;
            }
            offset += consumed;

            if status == Status::StreamEnd {
                stream_ended = true;
                break;
            }
            if consumed == 0 && produced == 0 {
                return Err(ArchiveError::Corrupted(
                    "DEFLATE decoder made no progress".to_string(),
                ));
            }
        }

        if stream_ended {
            break;
        }
    }

    if !stream_ended {
        return Err(ArchiveError::Corrupted(
            "compSize boundary reached before the DEFLATE stream ended".to_string(),
        ));
    }
    if decompressor.total_in() != comp_size {
        return Err(ArchiveError::Corrupted(format!(
            "DEFLATE stream ended after consuming {} of {} stored bytes",
            decompressor.total_in(),
            comp_size
        )));
    }

    Ok((crc_compressed.finalize(), crc_uncompressed.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn compress_then_decompress_roundtrips() {
        let original = b"Hello, World!\n".repeat(500);
        let mut compressed = Vec::new();
        let (comp_size, crc_in, crc_out) =
            compress_stream(&mut Cursor::new(&original), &mut compressed).unwrap();

        assert_eq!(comp_size, compressed.len() as u64);
        assert!(compressed.len() < original.len());

        let mut decompressed = Vec::new();
        let (crc_stored, crc_expanded) =
            decompress_stream(&mut Cursor::new(&compressed), &mut decompressed, comp_size)
                .unwrap();

        assert_eq!(decompressed, original);
        assert_eq!(crc_out, crc_stored);
        assert_eq!(crc_in, crc_expanded);
    }

    #[test]
    fn empty_input_compresses_to_a_valid_empty_stream() {
        let mut compressed = Vec::new();
        let (comp_size, crc_in, _crc_out) =
            compress_stream(&mut Cursor::new(&[] as &[u8]), &mut compressed).unwrap();
        assert_eq!(crc_in, 0);
        assert!(comp_size > 0); // raw DEFLATE still emits a terminating block

        let mut decompressed = Vec::new();
        let (_crc_stored, crc_expanded) =
            decompress_stream(&mut Cursor::new(&compressed), &mut decompressed, comp_size)
                .unwrap();
        assert!(decompressed.is_empty());
        assert_eq!(crc_expanded, 0);
    }

    #[test]
    fn incompressible_large_input_spans_multiple_chunks() {
        let original: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 256) as u8).collect();
        let mut compressed = Vec::new();
        let (comp_size, crc_in, _) =
            compress_stream(&mut Cursor::new(&original), &mut compressed).unwrap();

        let mut decompressed = Vec::new();
        decompress_stream(&mut Cursor::new(&compressed), &mut decompressed, comp_size).unwrap();
        assert_eq!(decompressed, original);
        assert_eq!(crc_in, crc32fast::hash(&original));
    }

    #[test]
    fn corrupted_stream_is_rejected() {
        let original = b"some data worth compressing, repeated a lot ".repeat(50);
        let mut compressed = Vec::new();
        let (comp_size, _, _) =
            compress_stream(&mut Cursor::new(&original), &mut compressed).unwrap();

        // Flip a byte in the middle of the stored body.
        let mid = compressed.len() / 2;
        compressed[mid] ^= 0xFF;

        let mut decompressed = Vec::new();
        let result =
            decompress_stream(&mut Cursor::new(&compressed), &mut decompressed, comp_size);
        assert!(result.is_err());
    }

    #[test]
    fn truncated_comp_size_is_rejected() {
        let original = b"Hello, World!\n".repeat(500);
        let mut compressed = Vec::new();
        let (comp_size, _, _) =
            compress_stream(&mut Cursor::new(&original), &mut compressed).unwrap();

        let mut decompressed = Vec::new();
        let result = decompress_stream(
            &mut Cursor::new(&compressed),
            &mut decompressed,
            comp_size - 1,
        );
        assert!(result.is_err());
    }
}
