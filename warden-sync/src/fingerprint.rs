//! Content fingerprint comparison.
//!
//! A fingerprint is the SHA-256 hex digest of the raw bytes. Nothing is
//! normalised: CRLF and LF versions of the same text are different files.

use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// How a destination file relates to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClassification {
    /// Missing or zero bytes at the destination.
    Absent,
    /// Same fingerprint as the source.
    Current,
    /// Present with a different fingerprint.
    Stale,
}

impl FileClassification {
    pub fn needs_deploy(self) -> bool {
        !matches!(self, FileClassification::Current)
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Classify in memory. `destination` is `None` when the file does not exist.
pub fn classify_bytes(source: &[u8], destination: Option<&[u8]>) -> FileClassification {
    match destination {
        None => FileClassification::Absent,
        Some(dest) if dest.is_empty() => FileClassification::Absent,
        Some(dest) if fingerprint(source) == fingerprint(dest) => FileClassification::Current,
        Some(_) => FileClassification::Stale,
    }
}

/// Classify two files on disk. Performs reads only.
pub fn classify(source: &Path, destination: Option<&Path>) -> Result<FileClassification, SyncError> {
    let Some(destination) = destination else {
        return Ok(FileClassification::Absent);
    };
    let dest_bytes = match std::fs::read(destination) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FileClassification::Absent),
        Err(err) => return Err(io_err(destination, err)),
    };
    if dest_bytes.is_empty() {
        return Ok(FileClassification::Absent);
    }
    let source_bytes = std::fs::read(source).map_err(|e| io_err(source, e))?;
    Ok(classify_bytes(&source_bytes, Some(&dest_bytes)))
}
