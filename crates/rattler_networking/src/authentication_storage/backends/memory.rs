//! In-memory storage backend, useful for tests and as the first entry in a storage chain.

use std::{collections::HashMap, sync::Mutex};

use crate::authentication_storage::{authentication::Authentication, StorageBackend, StorageBackendError};

/// Stores credentials in a process-local hashmap. Nothing is persisted across runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: Mutex<HashMap<String, Authentication>>,
}

impl MemoryStorage {
    /// Creates a new, empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn store(&self, host: &str, authentication: &Authentication) -> Result<(), StorageBackendError> {
        let mut store = self.store.lock().map_err(|_| StorageBackendError::Lock)?;
        store.insert(host.to_string(), authentication.clone());
        Ok(())
    }

    fn get(&self, host: &str) -> Result<Option<Authentication>, StorageBackendError> {
        let store = self.store.lock().map_err(|_| StorageBackendError::Lock)?;
        Ok(store.get(host).cloned())
    }

    fn delete(&self, host: &str) -> Result<(), StorageBackendError> {
        let mut store = self.store.lock().map_err(|_| StorageBackendError::Lock)?;
        store.remove(host);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
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
    fn test_memory_storage_independent_hosts() {
        let storage = MemoryStorage::new();
        storage
            .store("a.example.com", &Authentication::BearerToken("a".to_string()))
            .unwrap();
        storage
            .store("b.example.com", &Authentication::BearerToken("b".to_string()))
            .unwrap();
        assert_ne!(
            storage.get("a.example.com").unwrap(),
            storage.get("b.example.com").unwrap()
        );
    }
}
