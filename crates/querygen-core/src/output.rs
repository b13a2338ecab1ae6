//! Idempotent output sink.
//!
//! The generator participates in a build graph where file mtime
//! changes trigger downstream compilation, so an artifact is only
//! written when its bytes actually changed.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

/// Writes `contents` to `path` unless the file already holds the same
/// bytes. Returns whether a write happened.
///
/// # Errors
///
/// Returns any I/O error from the write; a failed read of the existing
/// file is treated as "needs writing".
pub fn write_if_changed(path: &Path, contents: &[u8]) -> io::Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents {
            debug!(path = %path.display(), "output unchanged, not rewriting");
            return Ok(false);
        }
    }
    fs::write(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(true)
}
