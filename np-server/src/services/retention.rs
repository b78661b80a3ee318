//! Delayed removal of served MIDI files

use std::path::PathBuf;
use std::time::Duration;

/// Delete `path` after `delay`, logging the outcome
///
/// Fire-and-forget; a file already gone is not an error.
pub fn schedule_removal(path: PathBuf, delay: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(path = %path.display(), "Auto-cleanup: removed output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Auto-cleanup failed"),
        }
    })
}
