// SPDX-License-Identifier: MIT

//! Crash-safe file writes (spec.md §4.1).
//!
//! Every persisted entity goes through [`write`] or [`append_line`] —
//! never a bare `std::fs::write`. No process observes a file in a torn
//! state: a write either lands the prior content or the full new
//! content, never a partial one.

use crate::error::StorageError;
use rand::Rng;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RENAME_MAX_ATTEMPTS: u32 = 5;
const RENAME_BASE_BACKOFF: Duration = Duration::from_millis(10);
const RENAME_MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Write `bytes` to `path` atomically: write to a sibling temp file,
/// `fsync` it, then `rename` onto `path`. Retries the rename with
/// bounded exponential backoff on platform locking errors (spec.md
/// §4.1: "On rename failure due to platform locking ... retry").
pub fn write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| StorageError::Io { path: dir.to_path_buf(), source })?;

    let tmp_path = sibling_temp_path(path);
    write_temp_file(&tmp_path, bytes)?;

    let mut attempt = 0;
    loop {
        match std::fs::rename(&tmp_path, path) {
            Ok(()) => return Ok(()),
            Err(source) if attempt + 1 < RENAME_MAX_ATTEMPTS && is_lock_contention(&source) => {
                attempt += 1;
                std::thread::sleep(backoff_for_attempt(attempt));
            }
            Err(source) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(StorageError::RenameExhausted {
                    path: path.to_path_buf(),
                    attempts: attempt + 1,
                    source,
                });
            }
        }
    }
}

fn write_temp_file(tmp_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = std::fs::File::create(tmp_path)
        .map_err(|source| StorageError::Io { path: tmp_path.to_path_buf(), source })?;
    file.write_all(bytes).map_err(|source| StorageError::Io { path: tmp_path.to_path_buf(), source })?;
    file.sync_all().map_err(|source| StorageError::Io { path: tmp_path.to_path_buf(), source })?;
    Ok(())
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let pid = std::process::id();
    let suffix: u32 = rand::thread_rng().gen();
    let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or("state").to_string();
    name.push_str(&format!(".tmp-{pid}-{suffix:08x}"));
    path.with_file_name(name)
}

fn is_lock_contention(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::Other
    )
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let scaled = RENAME_BASE_BACKOFF.saturating_mul(1u32 << attempt.min(8));
    scaled.min(RENAME_MAX_BACKOFF)
}

/// Append one self-contained record to `path`, a trailing newline
/// included, with a `sync_data` per call (spec.md §4.1: "one line
/// including a trailing newline; each line is a self-contained
/// record").
pub fn append_line(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| StorageError::Io { path: dir.to_path_buf(), source })?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    file.write_all(bytes).map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    file.write_all(b"\n").map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    file.sync_data().map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

/// Read the full contents of `path`. Missing files are not an error —
/// the caller sees `Ok(None)` (spec.md §4.1: "Readers tolerate missing
/// files").
pub fn read(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io { path: path.to_path_buf(), source }),
    }
}

/// Read `path` line by line, skipping a trailing empty line caused by
/// the final `\n` (spec.md §8: "the file ends with a newline").
pub fn read_lines(path: &Path) -> Result<Vec<Vec<u8>>, StorageError> {
    match read(path)? {
        None => Ok(Vec::new()),
        Some(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            Ok(text.lines().map(|line| line.as_bytes().to_vec()).collect())
        }
    }
}
