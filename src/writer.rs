//! `ArchiveWriter`: the write-session state machine (component D).
//!
//! `Open → Ready → WritingMember → Ready → … → Closed`. The constructor
//! creates/truncates the sink and writes a placeholder archive header;
//! `finalize` patches the real member count in and consumes the writer so no
//! further `add_file` call is reachable afterward.

use crate::compression::compress_stream;
use crate::error::{ArchiveError, Result};
use crate::format::{self, ArchiveHeader, FileHeader};
use crate::io::{copy_n_with_crc, Crc32};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// Writer over a single-file archive being built.
///
/// Not reentrant: the caller must serialize all operations on one writer, as
/// with any stateful stream-backed session.
pub struct ArchiveWriter {
    stream: BufWriter<File>,
    file_count: u32,
}

impl ArchiveWriter {
    /// Create (or truncate) the archive at `path` and write the placeholder
    /// archive header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut stream = BufWriter::new(file);

        ArchiveHeader::new().write_to(&mut stream)?;
        stream.flush()?;

        Ok(Self {
            stream,
            file_count: 0,
        })
    }

    /// Number of members successfully written so far.
    pub fn file_count(&self) -> u32 {
        self.file_count
    }

    /// Add a single regular file to the archive, DEFLATE-compressed.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.add_file_with_compression(path, true)
    }

    /// Add a single regular file, choosing whether its body is compressed.
    pub fn add_file_with_compression(
        &mut self,
        path: impl AsRef<Path>,
        compress: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let name = member_name(path)?;

        let mut source = File::open(path)?;
        let orig_size = source.metadata()?.len();

        let span = tracing::debug_span!("add_file", name = %name, orig_size, compress);
        let _enter = span.enter();

        let header = FileHeader::new(orig_size, compress);
        let offsets = format::write_file_header(&mut self.stream, &header, &name)?;

        let (comp_size, crc_uncompressed, crc_compressed) = if compress {
            compress_stream(&mut source, &mut self.stream)?
        } else {
            let mut crc = Crc32::new();
            copy_n_with_crc(&mut source, &mut self.stream, orig_size, &mut crc)?;
            let crc = crc.finalize();
            (orig_size, crc, crc)
        };

        // Member write succeeded: back-patch the header, then commit the
        // count bump. Any error above leaves these bytes in the file but the
        // in-memory file_count unchanged, per the write-session poisoning
        // rule — the caller sees the error and the archive is left invalid
        // for this member, but the stream position still ends at EOF because
        // every I/O helper below restores it on the way out.
        format::patch_file_header_comp_size(&mut self.stream, &offsets, comp_size)?;
        format::patch_file_header_crcs(
            &mut self.stream,
            &offsets,
            crc_uncompressed,
            crc_compressed,
        )?;

        self.file_count += 1;
        tracing::trace!(comp_size, crc_uncompressed, crc_compressed, "member written");

        Ok(())
    }

    /// Recursively add every regular file under `dir`, in directory-listing
    /// order. Symlinks are neither followed nor archived.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        self.add_directory_inner(dir.as_ref())
    }

    fn add_directory_inner(&mut self, dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.add_directory_inner(&path)?;
            } else if file_type.is_file() {
                self.add_file(&path)?;
            }
            // Symlinks: skip. Walker policy, not codec behavior.
        }

        Ok(())
    }

    /// Patch the archive header's `fileCount` and release the stream.
    pub fn finalize(mut self) -> Result<()> {
        format::patch_file_count(&mut self.stream, self.file_count)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Basename of `path`, used verbatim as the on-disk member name (no
/// directory prefix is stored; duplicate basenames from different source
/// directories are an accepted limitation, not an error here).
fn member_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .ok_or_else(|| ArchiveError::InvalidArgument(format!("{} has no file name", path.display())))?
        .to_str()
        .ok_or_else(|| {
            ArchiveError::InvalidArgument(format!("{} is not valid UTF-8", path.display()))
        })?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ArchiveReader;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempdir;

    #[test]
    fn empty_archive_is_32_bytes() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("a.arch");

        let writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&archive_path).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], b"ARCH");
        assert_eq!(&bytes[4..6], &[0x01, 0x00]);
        assert_eq!(&bytes[6..10], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn add_file_then_finalize_round_trips_through_reader() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("hello.txt");
        std::fs::write(&input_path, b"Hello, World!\n").unwrap();

        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.add_file(&input_path).unwrap();
        assert_eq!(writer.file_count(), 1);
        writer.finalize().unwrap();

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let mut reader = ArchiveReader::open(&archive_path).unwrap();
        assert_eq!(reader.file_count(), 1);
        let results = reader.extract_all(&out_dir);
        assert_eq!(results.len(), 1);
        results[0].as_ref().unwrap();

        let extracted = std::fs::read(out_dir.join("hello.txt")).unwrap();
        assert_eq!(extracted, b"Hello, World!\n");
    }

    #[test]
    fn name_near_filesystem_limit_round_trips() {
        // The exact 65535/65536-byte boundary from the format spec is
        // exercised directly against `write_file_header` in `format.rs`'s
        // tests, which operate on an in-memory buffer. Real filesystems
        // (ext4's 255-byte `NAME_MAX`, for one) reject component names far
        // short of 65535 bytes, so this test only checks that `add_file`
        // wires a name within that real limit through correctly.
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();

        let long_name = "a".repeat(200);
        let ok_path = dir.path().join(&long_name);
        std::fs::write(&ok_path, b"x").unwrap();
        writer.add_file(&ok_path).unwrap();
        assert_eq!(writer.file_count(), 1);
    }

    #[test]
    fn empty_member_round_trips() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("empty.bin");
        std::fs::File::create(&input_path).unwrap();

        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.add_file(&input_path).unwrap();
        writer.finalize().unwrap();

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let mut reader = ArchiveReader::open(&archive_path).unwrap();
        let results = reader.extract_all(&out_dir);
        results[0].as_ref().unwrap();
        assert_eq!(std::fs::read(out_dir.join("empty.bin")).unwrap().len(), 0);
    }

    #[test]
    fn add_directory_recurses_and_preserves_basenames() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("a.txt"), b"A").unwrap();
        std::fs::write(src.join("nested").join("b.txt"), b"B").unwrap();

        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.add_directory(&src).unwrap();
        assert_eq!(writer.file_count(), 2);
        writer.finalize().unwrap();

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let mut reader = ArchiveReader::open(&archive_path).unwrap();
        let results = reader.extract_all(&out_dir);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(std::fs::read(out_dir.join("a.txt")).unwrap(), b"A");
        assert_eq!(std::fs::read(out_dir.join("b.txt")).unwrap(), b"B");
    }

    #[test]
    fn uncompressed_member_stores_comp_size_equal_to_orig_size() {
        let dir = tempdir().unwrap();
        let input_path = dir.path().join("raw.bin");
        std::fs::write(&input_path, b"not compressed on disk").unwrap();

        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.add_file_with_compression(&input_path, false).unwrap();
        writer.finalize().unwrap();

        let mut file = File::open(&archive_path).unwrap();
        let header = ArchiveHeader::read_from(&mut file).unwrap();
        assert_eq!(header.file_count, 1);
        let (file_header, name) = format::read_file_header(&mut file).unwrap();
        assert_eq!(name, "raw.bin");
        assert!(!file_header.is_compressed());
        assert_eq!(file_header.comp_size, file_header.orig_size);
        assert_eq!(file_header.crc32_uncompressed, file_header.crc32_compressed);
    }

    #[test]
    fn multiple_members_are_written_in_call_order() {
        let dir = tempdir().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let archive_path = dir.path().join("a.arch");
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        for name in ["a", "b", "c"] {
            writer.add_file(dir.path().join(name)).unwrap();
        }
        writer.finalize().unwrap();

        let mut file = File::open(&archive_path).unwrap();
        let header = ArchiveHeader::read_from(&mut file).unwrap();
        assert_eq!(header.file_count, 3);

        let mut names = Vec::new();
        for _ in 0..3 {
            let (file_header, name) = format::read_file_header(&mut file).unwrap();
            file.seek(std::io::SeekFrom::Current(file_header.comp_size as i64))
                .unwrap();
            names.push(name);
        }
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
