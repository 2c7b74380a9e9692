//! Download lock serialising installation into the shared library directory.

use crate::provision::error::{ProvisionError, Result};
use crate::sync::KeyedMutex;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Lock file created inside the library directory.
pub const LOCK_FILE_NAME: &str = ".download.lock";

/// In-process side of the lock, keyed by canonical directory. File locks are
/// not reliably exclusive between threads on every platform.
static DIRECTORY_LOCKS: LazyLock<KeyedMutex<PathBuf>> = LazyLock::new(KeyedMutex::new);

/// Exclusive cross-process lock on `<dir>/.download.lock`, released on drop.
pub struct DownloadLock {
    file: File,
    path: PathBuf,
}

impl DownloadLock {
    /// Block until the lock for `directory` is held.
    pub fn acquire(directory: &Path) -> Result<Self> {
        let path = directory.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| ProvisionError::Lock {
                path: path.clone(),
                source,
            })?;

        FileExt::lock_exclusive(&file).map_err(|source| ProvisionError::Lock {
            path: path.clone(),
            source,
        })?;
        debug!("Acquired download lock {}", path.display());

        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DownloadLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released download lock {}", self.path.display());
    }
}

/// Run `f` while holding both the in-process and the file lock for
/// `directory`. Both are released when `f` returns, including on error.
pub fn with_download_lock<R>(directory: &Path, f: impl FnOnce() -> Result<R>) -> Result<R> {
    DIRECTORY_LOCKS.with_lock(directory.to_path_buf(), || {
        let _lock = DownloadLock::acquire(directory)?;
        f()
    })
}
