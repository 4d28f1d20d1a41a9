//! filearc: single-file archive container with streaming DEFLATE and
//! per-member CRC-32.
//!
//! Files are packed into one container behind a 32-byte archive header
//! followed by a sequence of file headers, each immediately preceding its
//! member's body. There is no central directory: both the writer and the
//! reader operate purely sequentially, which is what lets the writer stream a
//! member's compressed body before it knows the final compressed size or
//! either CRC — those fields are back-patched once the body is known.
//!
//! # Example
//!
//! ```no_run
//! use filearc::{ArchiveReader, ArchiveWriter};
//!
//! // Create an archive
//! let mut writer = ArchiveWriter::create("example.arch")?;
//! writer.add_file("data.txt")?;
//! writer.finalize()?;
//!
//! // Read it back
//! let mut reader = ArchiveReader::open("example.arch")?;
//! for result in reader.extract_all("out") {
//!     let member = result?;
//!     println!("extracted {}", member.name);
//! }
//! # Ok::<(), filearc::error::ArchiveError>(())
//! ```

pub mod compression;
pub mod error;
pub mod format;
pub mod io;
pub mod reader;
pub mod writer;

pub use error::{ArchiveError, Result};
pub use format::{ArchiveHeader, FileHeader, FLAG_COMPRESSED, MAGIC, VERSION};
pub use reader::{ArchiveReader, ExtractedMember};
pub use writer::ArchiveWriter;
