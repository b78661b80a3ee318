//! Upload and output working directories
//!
//! Both directories are process-wide filesystem state shared by every request.
//! Creation and purge run once per process behind [`WorkDirs::initialize`];
//! [`WorkDirs::ensure_exists`] is the cheap idempotent per-request check.

use crate::Result;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Upload and output directories owned by the process
#[derive(Debug, Clone)]
pub struct WorkDirs {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    initialized: Arc<OnceCell<()>>,
}

impl WorkDirs {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            initialized: Arc::new(OnceCell::new()),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories and optionally purge their contents
    ///
    /// Runs at most once per `WorkDirs` (and its clones). Purge failures are
    /// logged and never fatal; only directory creation can fail.
    pub fn initialize(&self, purge: bool) -> Result<()> {
        self.initialized
            .get_or_try_init(|| {
                self.ensure_exists()?;
                if purge {
                    let removed = purge_directory(&self.upload_dir)
                        + purge_directory(&self.output_dir);
                    info!(removed, "Purged working directories");
                }
                Ok::<(), crate::Error>(())
            })
            .map(|_| ())
    }

    /// Whether [`WorkDirs::initialize`] has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Create both directories if absent (idempotent, safe to race)
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Remove every entry inside `directory`, keeping the directory itself
///
/// Best-effort: failures are logged per entry. Returns the number of entries removed.
pub fn purge_directory(directory: &Path) -> usize {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %directory.display(), error = %e, "Failed to list directory for purge");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => std::fs::remove_dir_all(&path),
            Ok(_) => std::fs::remove_file(&path),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete during purge"),
        }
    }

    removed
}
