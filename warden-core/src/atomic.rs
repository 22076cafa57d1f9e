//! Same-directory temp file + rename.

use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};

/// Write `bytes` to `path` atomically.
///
/// Flow: create parent dirs → `<name>.tmp` sibling → `rename`. The `.tmp` is
/// always next to the target so the rename never crosses filesystems.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}
