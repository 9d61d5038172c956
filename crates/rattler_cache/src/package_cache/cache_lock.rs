use std::path::{Path, PathBuf};

use rattler_digest::{parse_digest_from_hex, Sha256, Sha256Hash};
use serde::{Deserialize, Serialize};

use crate::package_cache::PackageCacheError;

/// A lock on a cache entry. As long as this lock is held, no other process is allowed to
/// modify the entry. This does not guard against something other than this crate touching the
/// cache directory directly, but it does guarantee that concurrent `PackageCache` users, in this
/// process or another, do not interfere with each other's validate-then-fetch sequence.
pub struct CacheLock {
    pub(super) _lock: CacheRwLock,
    pub(super) revision: u64,
    pub(super) sha256: Option<Sha256Hash>,
    pub(super) path: PathBuf,
}

impl CacheLock {
    /// Returns the path to the cache entry on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the revision of the cache entry: how many times its content has been (re)written.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the sha256 of the content currently on disk, if known.
    pub fn sha256(&self) -> Option<Sha256Hash> {
        self.sha256
    }
}

#[derive(Default, Serialize, Deserialize)]
struct LockMetadata {
    revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(suffix);
    PathBuf::from(os_string)
}

/// An exclusive, cross-process advisory lock on a single cache entry, backed by a `<entry>.lock`
/// file. The revision counter and sha256 used to detect a stale entry live in a sibling
/// `<entry>.meta.json` file, read and written only while the lock is held.
///
/// Unlike the shared/exclusive split this is grounded on, every holder here — whether it's only
/// validating or about to fetch — takes the same exclusive lock. This scope never has enough
/// concurrent readers of one entry for a shared-lock fast path to be worth the extra state.
pub(super) struct CacheRwLock {
    lock_file: fslock::LockFile,
    meta_path: PathBuf,
}

impl CacheRwLock {
    pub(super) async fn acquire(path: &Path) -> Result<Self, PackageCacheError> {
        let lock_path = sibling_path(path, ".lock");
        let meta_path = sibling_path(path, ".meta.json");

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = lock_path.parent() {
                fs_err::create_dir_all(parent).map_err(|e| {
                    PackageCacheError::LockError(
                        format!("failed to create cache directory: '{}'", parent.display()),
                        e.into(),
                    )
                })?;
            }

            let mut lock_file = fslock::LockFile::open(&lock_path).map_err(|e| {
                PackageCacheError::LockError(
                    format!("failed to open cache lock file: '{}'", lock_path.display()),
                    e,
                )
            })?;
            if !lock_file.try_lock_with_pid().map_err(|e| {
                PackageCacheError::LockError(
                    format!("failed to acquire cache lock file: '{}'", lock_path.display()),
                    e,
                )
            })? {
                tracing::debug!(
                    "blocking waiting for file lock on package cache entry '{}'",
                    lock_path.display()
                );
                lock_file.lock_with_pid().map_err(|e| {
                    PackageCacheError::LockError(
                        format!("failed to acquire cache lock file: '{}'", lock_path.display()),
                        e,
                    )
                })?;
            }
            Ok(CacheRwLock {
                lock_file,
                meta_path,
            })
        })
        .await
        .map_err(|_| PackageCacheError::Cancelled)?
    }

    /// Reads the revision and sha256 recorded for this entry. Absent the metadata file, this is
    /// a brand new entry at revision 0.
    pub(super) fn read_metadata(&self) -> Result<(u64, Option<Sha256Hash>), PackageCacheError> {
        if !self.meta_path.is_file() {
            return Ok((0, None));
        }
        let contents = std::fs::read_to_string(&self.meta_path).map_err(|e| {
            PackageCacheError::LockError(
                format!("failed to read cache metadata: '{}'", self.meta_path.display()),
                e,
            )
        })?;
        let meta: LockMetadata = serde_json::from_str(&contents).unwrap_or_default();
        let sha256 = meta
            .sha256
            .as_deref()
            .and_then(parse_digest_from_hex::<Sha256>);
        Ok((meta.revision, sha256))
    }

    /// Writes a new revision and sha256 for this entry.
    pub(super) fn write_metadata(
        &self,
        revision: u64,
        sha256: Option<&Sha256Hash>,
    ) -> Result<(), PackageCacheError> {
        let meta = LockMetadata {
            revision,
            sha256: sha256.map(|hash| format!("{hash:x}")),
        };
        let contents =
            serde_json::to_string(&meta).expect("LockMetadata serialization never fails");
        std::fs::write(&self.meta_path, contents).map_err(|e| {
            PackageCacheError::LockError(
                format!("failed to write cache metadata: '{}'", self.meta_path.display()),
                e,
            )
        })
    }
}

impl Drop for CacheRwLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::CacheRwLock;
    use rattler_digest::{parse_digest_from_hex, Sha256};

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let entry_path = temp_dir.path().join("foo-1.0-0");

        let lock = CacheRwLock::acquire(&entry_path).await.unwrap();
        assert_eq!(lock.read_metadata().unwrap(), (0, None));

        let sha = parse_digest_from_hex::<Sha256>(
            "4dd9893f1eee45e1579d1a4f5533ef67a84b5e4b7515de7ed0db1dd47adc6bc8",
        );
        lock.write_metadata(1, sha.as_ref()).unwrap();
        assert_eq!(lock.read_metadata().unwrap(), (1, sha));
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive_across_handles() {
        let temp_dir = tempfile::tempdir().unwrap();
        let entry_path = temp_dir.path().join("foo-1.0-0");

        let first = CacheRwLock::acquire(&entry_path).await.unwrap();
        first.write_metadata(3, None).unwrap();
        drop(first);

        // Once dropped, a second acquire on the same path succeeds and observes the write.
        let second = CacheRwLock::acquire(&entry_path).await.unwrap();
        assert_eq!(second.read_metadata().unwrap(), (3, None));
    }
}
