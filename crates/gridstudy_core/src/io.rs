//! I/O utility functions

use std::fs;
use std::io;
use std::path::Path;

/// Write bytes to a file atomically using the write-then-rename pattern.
///
/// The content goes to a sibling `.tmp` file first and is renamed over the
/// target, so readers never observe a half-written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
