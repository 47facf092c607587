//! Atomic file replacement
//!
//! Content is written to a temporary file in the destination directory,
//! flushed to disk, then renamed over the destination. A reader sees either
//! the previous complete file or the new complete file, never a prefix.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Writes `contents` to `path` atomically
///
/// The temporary file lives next to the destination so the final rename never
/// crosses a filesystem boundary. If any step fails the temporary file is
/// removed and the destination is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Runs [`write_atomic`] on a blocking thread, bounded by `timeout`
///
/// Used from async code so a stalled disk never blocks the runtime and never
/// hangs the run indefinitely.
pub async fn write_atomic_with_timeout(
    path: PathBuf,
    contents: Vec<u8>,
    timeout: Duration,
) -> io::Result<()> {
    let display = path.display().to_string();
    let task = tokio::task::spawn_blocking(move || write_atomic(&path, &contents));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(io::Error::new(
            io::ErrorKind::Other,
            format!("write task for {} failed: {}", display, join_err),
        )),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("write to {} timed out after {:?}", display, timeout),
        )),
    }
}
