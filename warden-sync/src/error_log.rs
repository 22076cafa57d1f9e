//! Append-only CSV log of per-repository failures.
//!
//! Columns: `Repository Name,Error Message,Timestamp`. The header is written
//! when the file is empty. Rows go through a `csv::Writer`, quoting only
//! where needed and ending each record in CRLF.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};

use warden_core::RepoName;

use crate::error::{io_err, SyncError};
use crate::report::timestamp;

pub const HEADER: [&str; 3] = ["Repository Name", "Error Message", "Timestamp"];

/// Replacement for the push rejection GitHub returns on protected branches.
pub const PROTECTED_BRANCH_MESSAGE: &str =
    "Failed to update the org-policies due to branch protection rule";

const PROTECTED_BRANCH_MARKERS: [&str; 3] = ["GH006", "Protected branch update failed for", "a/"];

/// Collapse the protected-branch push rejection into a single readable line.
/// Any other message is returned unchanged.
pub fn normalize_message(message: &str) -> String {
    if PROTECTED_BRANCH_MARKERS.iter().all(|m| message.contains(m)) {
        PROTECTED_BRANCH_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(out)
}

/// Append one failure row to the log at `path`.
pub fn append_at(
    path: &Path,
    repo: &RepoName,
    message: &str,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    let len = file.metadata().map_err(|e| io_err(path, e))?.len();

    let mut writer = csv_writer(file);
    if len == 0 {
        writer.write_record(HEADER).map_err(|e| io_err(path, e.into()))?;
    }
    let message = normalize_message(message);
    let ts = timestamp(now);
    writer
        .write_record([repo.0.as_str(), message.as_str(), ts.as_str()])
        .map_err(|e| io_err(path, e.into()))?;
    writer.flush().map_err(|e| io_err(path, e))?;
    tracing::debug!(repo = %repo, path = %path.display(), "failure appended to error log");
    Ok(())
}
