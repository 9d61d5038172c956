//! On-disk JSON storage backend, guarded by an advisory file lock so that concurrent
//! processes (e.g. several solves running at once) don't clobber each other's writes.

use std::{collections::BTreeMap, path::PathBuf};

use crate::authentication_storage::{authentication::Authentication, StorageBackend};

/// Errors that can occur while reading or writing the file-backed store.
#[derive(Debug, thiserror::Error)]
pub enum FileStorageError {
    /// An IO error occurred while accessing the file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to acquire the advisory lock on the storage file.
    #[error("failed to lock credentials file {0}")]
    FailedToLock(String, #[source] std::io::Error),
    /// The file did not contain valid JSON.
    #[error("invalid credentials file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stores credentials in a JSON file, keyed by host.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// The path to the JSON file.
    pub path: PathBuf,
}

impl FileStorage {
    /// Creates a file storage backend rooted at `path`. The file and its parent directory are
    /// created lazily on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a file storage backend at the default rattler credentials location.
    pub fn from_default_location() -> Result<Self, FileStorageError> {
        let home = dirs::home_dir().ok_or_else(|| {
            FileStorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        Ok(Self::new(home.join(".rattler").join("credentials.json")))
    }

    fn lock(&self) -> Result<fslock::LockFile, FileStorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = self.path.with_extension("json.lock");
        let mut lock = fslock::LockFile::open(&lock_path)
            .map_err(|e| FileStorageError::FailedToLock(lock_path.to_string_lossy().into_owned(), e))?;
        if !lock
            .try_lock_with_pid()
            .map_err(|e| FileStorageError::FailedToLock(lock_path.to_string_lossy().into_owned(), e))?
        {
            tracing::debug!("waiting for lock on {}", lock_path.display());
            lock.lock_with_pid()
                .map_err(|e| FileStorageError::FailedToLock(lock_path.to_string_lossy().into_owned(), e))?;
        }
        Ok(lock)
    }

    fn read(&self) -> Result<BTreeMap<String, Authentication>, FileStorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = std::fs::File::open(&self.path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    fn write(&self, dict: &BTreeMap<String, Authentication>) -> Result<(), FileStorageError> {
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), dict)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn store(
        &self,
        host: &str,
        authentication: &Authentication,
    ) -> Result<(), crate::authentication_storage::StorageBackendError> {
        let _lock = self.lock()?;
        let mut dict = self.read()?;
        dict.insert(host.to_string(), authentication.clone());
        self.write(&dict)?;
        Ok(())
    }

    fn get(
        &self,
        host: &str,
    ) -> Result<Option<Authentication>, crate::authentication_storage::StorageBackendError> {
        let _lock = self.lock()?;
        Ok(self.read()?.get(host).cloned())
    }

    fn delete(&self, host: &str) -> Result<(), crate::authentication_storage::StorageBackendError> {
        let _lock = self.lock()?;
        let mut dict = self.read()?;
        if dict.remove(host).is_some() {
            self.write(&dict)?;
        }
        Ok(())
    }
}

impl From<FileStorageError> for crate::authentication_storage::StorageBackendError {
    fn from(err: FileStorageError) -> Self {
        crate::authentication_storage::StorageBackendError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("credentials.json"));

        assert_eq!(storage.get("test").unwrap(), None);
        storage
            .store("test", &Authentication::CondaToken("secret".to_string()))
            .unwrap();
        assert_eq!(
            storage.get("test").unwrap(),
            Some(Authentication::CondaToken("secret".to_string()))
        );

        storage.delete("test").unwrap();
        assert_eq!(storage.get("test").unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        FileStorage::new(path.clone())
            .store(
                "basic.example.com",
                &Authentication::BasicHttp {
                    username: "user".to_string(),
                    password: "pass".to_string(),
                },
            )
            .unwrap();

        let reopened = FileStorage::new(path);
        assert_eq!(
            reopened.get("basic.example.com").unwrap(),
            Some(Authentication::BasicHttp {
                username: "user".to_string(),
                password: "pass".to_string(),
            })
        );
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(path);
        assert!(storage.get("test").is_err());
    }
}
