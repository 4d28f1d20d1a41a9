use std::io;
use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Unified error type for all archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid magic number in archive header")]
    BadMagic,

    #[error("unsupported archive version: {0}")]
    UnsupportedVersion(u16),

    #[error("corrupted archive: {0}")]
    Corrupted(String),

    #[error("CRC mismatch: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("name too long: {0} bytes (max 65535)")]
    NameTooLong(usize),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("internal error: {0}")]
    Internal(String),
}
