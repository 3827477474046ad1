//! Crash-safe file replacement.
//!
//! Ledgers, card images and generation records are only ever written through
//! [`write_atomic`]: the bytes go to a temporary sibling file which is then
//! renamed over the destination. Readers see either the old file or the new
//! one, never a truncated mix.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `bytes`, creating parent directories as needed.
///
/// The temporary file lives in the destination directory so the final rename
/// never crosses filesystems. It is removed if any step fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
