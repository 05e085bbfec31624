//! Exclusive lock around one cached archive.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Two installs of the same version would otherwise race on the download
/// and its sidecar files, so each holds `<target>.lock` while it works.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock for `target` is held.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the lock file cannot be created or locked.
    pub fn acquire(target: &Path) -> std::io::Result<Self> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file, path })
    }

    /// Take the lock only if nobody else holds it.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the lock file cannot be created.
    pub fn try_acquire(target: &Path) -> std::io::Result<Option<Self>> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The lock file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
