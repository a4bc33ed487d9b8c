//! File-based locking to prevent concurrent runs against one backup directory

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file name; contains no service name so the retention sweep skips it
pub const LOCK_FILE_NAME: &str = ".stack-backup.lock";

/// Exclusive lock on a backup directory, held for the duration of a run.
///
/// The lock file is never deleted. Unlinking it would let a later run lock
/// a fresh inode while another still holds the old one.
pub struct RunLock {
    // The lock itself is leaked so the guard can be 'static; dropping the
    // guard releases the lock, the leaked handle lives until process exit.
    guard: Option<RwLockWriteGuard<'static, File>>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire the lock for `backup_dir`.
    /// Returns error if another run already holds it.
    pub fn acquire(backup_dir: &Path) -> Result<Self> {
        let lock_path = backup_dir.join(LOCK_FILE_NAME);

        debug!("Attempting to acquire lock: {:?}", lock_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let lock: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));
        let guard = lock.try_write().with_context(|| {
            format!(
                "Another backup run is already using {:?} (lock held)",
                backup_dir
            )
        })?;

        info!("Acquired run lock: {:?}", lock_path);

        Ok(Self {
            guard: Some(guard),
            lock_path,
        })
    }

    /// Get the lock file path
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.guard.take();
        info!("Released run lock: {:?}", self.lock_path);
    }
}
