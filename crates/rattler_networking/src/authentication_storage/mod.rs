//! The authentication storage backend trait and its implementations (C5).

use self::authentication::Authentication;

pub mod authentication;
pub mod backends;
pub mod storage;

/// An error that occurred while storing or retrieving credentials from a backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageBackendError {
    /// An internal lock was poisoned by a panicking thread.
    #[error("storage backend lock was poisoned")]
    Lock,
    /// A backend-specific error, carried as its rendered message.
    #[error("{0}")]
    Backend(String),
}

/// A single place credentials for a host can be stored and retrieved.
///
/// [`storage::AuthenticationStorage`] layers several of these, trying each in turn.
pub trait StorageBackend: std::fmt::Debug {
    /// Stores `authentication` for `host`, overwriting any prior entry.
    fn store(&self, host: &str, authentication: &Authentication) -> Result<(), StorageBackendError>;

    /// Retrieves the credentials stored for `host`, if any.
    fn get(&self, host: &str) -> Result<Option<Authentication>, StorageBackendError>;

    /// Removes any credentials stored for `host`.
    fn delete(&self, host: &str) -> Result<(), StorageBackendError>;
}
