//! Advisory locking for a package cache directory or prefix directory (§5), grounded in the
//! teacher's `utils/lock_file.rs`, extended with the bounded exponential backoff §5 asks for
//! instead of blocking forever on `lock()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RattlerError;

/// Holds an advisory file lock for as long as it's alive; the lock file is removed on drop.
pub struct DirLock {
    path: PathBuf,
    lock: Option<fslock::LockFile>,
}

impl DirLock {
    /// Acquires a lock on `<dir>/.lock`, retrying with exponential backoff (starting at 50ms,
    /// doubling, capped by `max_wait`) until it succeeds or `max_wait` elapses.
    pub async fn acquire(dir: &Path, max_wait: Duration) -> Result<Self, RattlerError> {
        std::fs::create_dir_all(dir).map_err(|cause| RattlerError::Io { path: dir.to_path_buf(), cause })?;
        let path = dir.join(".lock");

        let mut delay = Duration::from_millis(50);
        let deadline = std::time::Instant::now() + max_wait;
        loop {
            let mut lock = fslock::LockFile::open(&path)
                .map_err(|cause| RattlerError::Io { path: path.clone(), cause })?;
            if lock.try_lock().map_err(|cause| RattlerError::Io { path: path.clone(), cause })? {
                return Ok(Self { path, lock: Some(lock) });
            }

            if std::time::Instant::now() >= deadline {
                return Err(RattlerError::LockTimeout { path });
            }
            tokio::time::sleep(delay.min(deadline.saturating_duration_since(std::time::Instant::now()))).await;
            delay = (delay * 2).min(Duration::from_secs(5));
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        drop(self.lock.take());
        let _ = std::fs::remove_file(&self.path);
    }
}
