//! `ArchiveReader`: the read-session state machine (component D).
//!
//! `Open → Ready → ReadingMember → Ready → … → EndOfArchive`. Reads are
//! purely sequential — there is no index or central directory to consult, so
//! a member's body must be fully consumed (and its CRCs verified) before the
//! next header can be read.

use crate::compression::decompress_stream;
use crate::error::{ArchiveError, Result};
use crate::format::{self, ArchiveHeader, FileHeader};
use crate::io::{copy_n_with_crc, tell, Crc32};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Upper bound on the `Vec` capacity `extract_all` will pre-allocate from the
/// archive header's `fileCount`. That field is attacker-controlled and only
/// magic/version-checked at this point, so a crafted header claiming
/// `u32::MAX` members must not translate into a multi-hundred-GB allocation
/// request; the vector still grows past this bound organically as members
/// are actually read.
const MAX_PREALLOCATED_MEMBERS: usize = 4096;

/// One member successfully extracted from the archive.
#[derive(Debug, Clone)]
pub struct ExtractedMember {
    pub name: String,
    pub path: PathBuf,
    pub orig_size: u64,
}

/// Reader over an existing archive file.
pub struct ArchiveReader {
    stream: File,
    header: ArchiveHeader,
}

impl ArchiveReader {
    /// Open `path` and validate the archive header eagerly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = File::open(path)?;
        let header = ArchiveHeader::read_from(&mut stream)?;
        Ok(Self { stream, header })
    }

    /// Number of members declared by the archive header.
    pub fn file_count(&self) -> u32 {
        self.header.file_count
    }

    /// Extract every member into `output_dir`, in archive order.
    ///
    /// Per-member failures do not abort the session: each member yields its
    /// own `Result`, so a later member can still be read even if an earlier
    /// one is corrupted. A member's body occupies exactly `compSize` bytes
    /// (the format invariant in spec §3.3), so `decompress_stream` and
    /// `copy_n_with_crc` always consume that many bytes from the archive
    /// stream before a CRC can even be compared — a `CrcMismatch`, or any
    /// other failure discovered only after the body was fully consumed,
    /// leaves the stream correctly positioned at the next header and the
    /// loop simply advances. Only a failure that aborts *before* the body is
    /// fully consumed (a short header read, or the archive running out of
    /// bytes mid-body) leaves the stream position untrustworthy; from that
    /// point on there's no index to resynchronize from, so the remaining
    /// members are reported as failed too.
    pub fn extract_all(&mut self, output_dir: impl AsRef<Path>) -> Vec<Result<ExtractedMember>> {
        let output_dir = output_dir.as_ref();
        let mut results =
            Vec::with_capacity((self.header.file_count as usize).min(MAX_PREALLOCATED_MEMBERS));
        let mut desynced = false;

        for index in 0..self.header.file_count {
            if desynced {
                results.push(Err(ArchiveError::Corrupted(format!(
                    "cannot locate member {index}: a prior member left the stream desynced"
                ))));
                continue;
            }

            let (result, lost_sync) = self.extract_next(output_dir);
            desynced = lost_sync;
            results.push(result);
        }

        results
    }

    /// Read one member's header and body. Returns the member result alongside
    /// whether the archive stream is still positioned at the next header
    /// afterward — determined by comparing the stream position against
    /// `body_start + compSize`, not by the kind of error (if any) that
    /// occurred, since the same error kind can occur both before and after
    /// the body was fully drained from the stream.
    fn extract_next(&mut self, output_dir: &Path) -> (Result<ExtractedMember>, bool) {
        let (file_header, name) = match format::read_file_header(&mut self.stream) {
            Ok(pair) => pair,
            Err(err) => return (Err(err), true),
        };

        let span = tracing::debug_span!("extract_member", name = %name, comp_size = file_header.comp_size);
        let _enter = span.enter();

        let body_start = match tell(&mut self.stream) {
            Ok(pos) => pos,
            Err(err) => return (Err(err), true),
        };
        let expected_body_end = body_start + file_header.comp_size;

        let result = self.extract_body(output_dir, &file_header, &name);

        let lost_sync = match tell(&mut self.stream) {
            Ok(pos) => pos != expected_body_end,
            Err(_) => true,
        };

        (result, lost_sync)
    }

    fn extract_body(
        &mut self,
        output_dir: &Path,
        file_header: &FileHeader,
        name: &str,
    ) -> Result<ExtractedMember> {
        let dest_path = output_dir.join(name);
        let mut dest = File::create(&dest_path)?;

        let (crc_stored, crc_expanded) = if file_header.is_compressed() {
            decompress_stream(&mut self.stream, &mut dest, file_header.comp_size)?
        } else {
            let mut crc = Crc32::new();
            copy_n_with_crc(&mut self.stream, &mut dest, file_header.comp_size, &mut crc)?;
            let crc = crc.finalize();
            (crc, crc)
        };
        dest.flush()?;

        if crc_expanded != file_header.crc32_uncompressed {
            tracing::warn!(
                expected = file_header.crc32_uncompressed,
                actual = crc_expanded,
                "uncompressed CRC mismatch"
            );
            return Err(ArchiveError::CrcMismatch {
                expected: file_header.crc32_uncompressed,
                actual: crc_expanded,
            });
        }
        if crc_stored != file_header.crc32_compressed {
            tracing::warn!(
                expected = file_header.crc32_compressed,
                actual = crc_stored,
                "stored CRC mismatch"
            );
            return Err(ArchiveError::CrcMismatch {
                expected: file_header.crc32_compressed,
                actual: crc_stored,
            });
        }

        Ok(ExtractedMember {
            name: name.to_string(),
            path: dest_path,
            orig_size: file_header.orig_size,
        })
    }
}
