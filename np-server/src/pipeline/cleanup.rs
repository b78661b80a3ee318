//! Scoped ownership of the temporary input file

use std::path::{Path, PathBuf};

/// Deletes the uploaded input file when released or dropped
///
/// Deletion happens at most once. Failures are logged, never returned, so
/// cleanup can't mask the request's real outcome.
#[derive(Debug)]
pub struct TempInput {
    path: PathBuf,
    released: bool,
}

impl TempInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file if it still exists. Returns true if a file was removed.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Immediate cleanup: removed input");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Input cleanup error");
                false
            }
        }
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_deletes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_song.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let mut guard = TempInput::new(&path);
        assert!(guard.release());
        assert!(!path.exists());
        assert!(!guard.release());
    }

    #[test]
    fn drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_song.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        {
            let _guard = TempInput::new(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn drop_runs_during_unwind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_song.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let guarded = path.clone();
        let outcome = std::panic::catch_unwind(move || {
            let _guard = TempInput::new(guarded);
            panic!("engine blew up");
        });

        assert!(outcome.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut guard = TempInput::new(dir.path().join("never-written.wav"));
        assert!(!guard.release());
    }

    #[test]
    fn released_guard_does_not_touch_a_recreated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_song.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let mut guard = TempInput::new(&path);
        guard.release();
        std::fs::write(&path, b"RIFF").unwrap();
        drop(guard);

        assert!(path.exists());
    }
}
