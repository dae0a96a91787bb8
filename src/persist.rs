//! Whole-file rewrites for the two file-resident artifacts.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `contents` to a sibling temp file, sync it, then rename over `path`.
///
/// A crash leaves either the old file or the new one, never a torn write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = sibling(path, ".tmp");
    let written = write_synced(&tmp, contents).and_then(|()| std::fs::rename(&tmp, path));
    if written.is_err() {
        // best effort
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
