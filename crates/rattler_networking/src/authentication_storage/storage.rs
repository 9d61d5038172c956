//! Storage and lookup of authentication information across multiple backends.

use std::sync::Arc;

use url::Url;

use super::{
    authentication::Authentication,
    backends::{file::FileStorage, memory::MemoryStorage},
    StorageBackend, StorageBackendError,
};

/// The host key under which credentials that apply to every host are stored.
const GLOBAL_DEFAULT_HOST: &str = "*";

/// Looks up credentials by host across one or more [`StorageBackend`]s, trying each backend
/// in the order it was added until one has an answer. A host lookup never matches credentials
/// stored under a different host: to serve `repo.prefix.dev` with `*.prefix.dev` credentials the
/// wildcard entry must be looked up explicitly, which [`AuthenticationStorage::get_by_url`] does.
#[derive(Debug, Clone)]
pub struct AuthenticationStorage {
    /// The backends to query, tried in order.
    pub backends: Vec<Arc<dyn StorageBackend + Send + Sync>>,
}

impl Default for AuthenticationStorage {
    /// The default storage chain: an in-memory cache backed by the on-disk credentials file.
    fn default() -> Self {
        let mut storage = Self::empty();
        storage.add_backend(Arc::new(MemoryStorage::new()));
        if let Ok(file_storage) = FileStorage::from_default_location() {
            storage.add_backend(Arc::new(file_storage));
        }
        storage
    }
}

impl AuthenticationStorage {
    /// Creates a storage with no backends. [`AuthenticationStorage::get`] always returns `None`
    /// until at least one backend is added.
    pub fn empty() -> Self {
        Self { backends: Vec::new() }
    }

    /// Builds the default storage chain, optionally overridden by the `RATTLER_AUTH_FILE`
    /// environment variable.
    pub fn from_env_and_defaults() -> Self {
        let mut storage = Self::empty();
        storage.add_backend(Arc::new(MemoryStorage::new()));
        if let Ok(auth_file) = std::env::var("RATTLER_AUTH_FILE") {
            tracing::info!("RATTLER_AUTH_FILE set, using file storage at {auth_file}");
            storage.add_backend(Arc::new(FileStorage::new(auth_file.into())));
        } else if let Ok(file_storage) = FileStorage::from_default_location() {
            storage.add_backend(Arc::new(file_storage));
        }
        storage
    }

    /// Appends a backend to the chain. Backends added earlier are consulted first.
    pub fn add_backend(&mut self, backend: Arc<dyn StorageBackend + Send + Sync>) {
        self.backends.push(backend);
    }

    /// Stores `authentication` for `host` in the first backend that accepts the write.
    pub fn store(&self, host: &str, authentication: &Authentication) -> Result<(), StorageBackendError> {
        for backend in &self.backends {
            match backend.store(host, authentication) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("backend failed to store credentials: {e}"),
            }
        }
        Err(StorageBackendError::Backend(
            "all backends failed to store credentials".to_string(),
        ))
    }

    /// Looks up credentials stored under exactly `host`, without any wildcard expansion.
    pub fn get(&self, host: &str) -> Option<Authentication> {
        for backend in &self.backends {
            match backend.get(host) {
                Ok(Some(auth)) => return Some(auth),
                Ok(None) => continue,
                Err(e) => tracing::warn!("backend failed to retrieve credentials: {e}"),
            }
        }
        None
    }

    /// Removes any credentials stored for `host` from every backend.
    pub fn delete(&self, host: &str) -> Result<(), StorageBackendError> {
        let mut any_succeeded = false;
        for backend in &self.backends {
            match backend.delete(host) {
                Ok(()) => any_succeeded = true,
                Err(e) => tracing::warn!("backend failed to delete credentials: {e}"),
            }
        }
        if any_succeeded {
            Ok(())
        } else {
            Err(StorageBackendError::Backend(
                "all backends failed to delete credentials".to_string(),
            ))
        }
    }

    /// Finds the most specific credentials that apply to `url`'s host: an exact match, then a
    /// `*.suffix` wildcard for each parent domain from most to least specific, then the global
    /// default entry. Returns `None` if the URL has no host or nothing matches.
    pub fn get_by_url(&self, url: &Url) -> Option<Authentication> {
        let host = url.host_str()?;

        if let Some(auth) = self.get(host) {
            return Some(auth);
        }

        let mut domain = url.domain()?;
        loop {
            if let Some(auth) = self.get(&format!("*.{domain}")) {
                return Some(auth);
            }
            match domain.split_once('.') {
                Some((_, rest)) => domain = rest,
                None => break,
            }
        }

        self.get(GLOBAL_DEFAULT_HOST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication_storage::backends::memory::MemoryStorage;

    fn storage_with(entries: &[(&str, Authentication)]) -> AuthenticationStorage {
        let mut storage = AuthenticationStorage::empty();
        let memory = MemoryStorage::new();
        for (host, auth) in entries {
            memory.store(host, auth).unwrap();
        }
        storage.add_backend(Arc::new(memory));
        storage
    }

    #[test]
    fn test_exact_host_match() {
        let storage = storage_with(&[("repo.example.com", Authentication::BearerToken("t".to_string()))]);
        let url = Url::parse("https://repo.example.com/channel/repodata.json").unwrap();
        assert_eq!(storage.get_by_url(&url), Some(Authentication::BearerToken("t".to_string())));
    }

    #[test]
    fn test_wildcard_suffix_match() {
        let storage = storage_with(&[("*.prefix.dev", Authentication::CondaToken("wild".to_string()))]);
        let url = Url::parse("https://repo.prefix.dev/conda-forge/noarch/repodata.json").unwrap();
        assert_eq!(storage.get_by_url(&url), Some(Authentication::CondaToken("wild".to_string())));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let storage = storage_with(&[
            ("*.prefix.dev", Authentication::CondaToken("wild".to_string())),
            ("repo.prefix.dev", Authentication::CondaToken("exact".to_string())),
        ]);
        let url = Url::parse("https://repo.prefix.dev/conda-forge").unwrap();
        assert_eq!(storage.get_by_url(&url), Some(Authentication::CondaToken("exact".to_string())));
    }

    #[test]
    fn test_global_default_fallback() {
        let storage = storage_with(&[(GLOBAL_DEFAULT_HOST, Authentication::BearerToken("default".to_string()))]);
        let url = Url::parse("https://anything.example.org/x").unwrap();
        assert_eq!(storage.get_by_url(&url), Some(Authentication::BearerToken("default".to_string())));
    }

    #[test]
    fn test_no_cross_host_match() {
        let storage = storage_with(&[("other.example.com", Authentication::BearerToken("t".to_string()))]);
        let url = Url::parse("https://repo.example.com/x").unwrap();
        assert_eq!(storage.get_by_url(&url), None);
    }
}
