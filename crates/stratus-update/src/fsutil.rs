//! Small filesystem helpers shared by the persisted-state modules.

use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` atomically: write to a temp file in the same
/// directory, then rename over the destination. A crash mid-write can never
/// leave a readable-but-truncated file behind.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::other("destination has no parent directory"))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
