#![no_main]

use filearc::ArchiveReader;
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    // Skip inputs smaller than the archive header itself.
    if data.len() < 32 {
        return;
    }

    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };

    if temp_file.write_all(data).is_err() {
        return;
    }
    if temp_file.flush().is_err() {
        return;
    }

    // Opening should never panic, including on garbage magic/version bytes.
    let mut reader = match ArchiveReader::open(temp_file.path()) {
        Ok(r) => r,
        Err(_) => return,
    };

    let _ = reader.file_count();

    let out_dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };

    // Extraction must never panic, regardless of how corrupted the member
    // headers or DEFLATE bodies are; individual failures surface as `Err`
    // entries in the returned vector instead of aborting the whole pass.
    let _ = reader.extract_all(out_dir.path());
});
