//! A cache of extracted (and, alongside them, still-archived) packages, keyed by
//! `<name>-<version>-<build>` and validated by sha256 when one is known.
//!
//! A single cache directory holds, per package, a `<cache_key>.<ext>` archive and a
//! `<cache_key>/` extracted directory side by side — this module treats a [`CacheKey`] as the
//! shared identity for both, handing out whichever the caller asked for once it's known good.

mod cache_key;
mod cache_lock;
mod reporter;

use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use rattler_networking::{FetchError, Fetcher, Request};
use rattler_package_streaming::ExtractError;
use url::Url;

pub use cache_key::CacheKey;
pub use cache_lock::CacheLock;
use cache_lock::CacheRwLock;
pub use reporter::CacheReporter;

use crate::validation::validate_package_directory;

/// An error that can occur while interacting with the [`PackageCache`].
#[derive(Debug, thiserror::Error)]
pub enum PackageCacheError {
    /// The operation was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// An error occurred while acquiring or reading/writing the lock for a cache entry.
    #[error("{0}")]
    LockError(String, #[source] std::io::Error),

    /// A fetch function failed to place a valid package at the requested location.
    #[error(transparent)]
    FetchError(Arc<dyn Error + Send + Sync + 'static>),
}

/// The cache directory a [`PackageCache`] manages.
///
/// Concurrent callers for the same entry (in this process or another) are serialized by
/// [`CacheRwLock`], a cross-process file lock keyed on the entry's path — there's no separate
/// in-process lock table, since the file lock already covers both cases.
pub struct PackageCache {
    path: PathBuf,
}

impl PackageCache {
    /// Creates a new [`PackageCache`] rooted at `path`, creating the directory if necessary.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the directory this cache stores its entries in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.path.join(key.to_string())
    }

    /// Returns a read-only handle to the extracted package directory for `key`, fetching and
    /// extracting it first if it isn't already cached (or is cached but invalid/stale).
    ///
    /// `fetch` is called with the destination the archive must end up at; it's expected to
    /// download (or otherwise materialize) the archive there. Once it returns successfully this
    /// extracts the archive and validates the result.
    ///
    /// `archive_extension` (e.g. `".conda"` or `".tar.bz2"`) decides the archive's on-disk name
    /// and, via [`rattler_package_streaming::tokio::extract`], how it's unpacked — it must match
    /// whatever `fetch` actually writes.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        pkg: impl Into<CacheKey>,
        archive_extension: &str,
        fetch: F,
        reporter: Option<Arc<dyn CacheReporter>>,
    ) -> Result<CacheLock, PackageCacheError>
    where
        F: Fn(PathBuf) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), E>> + Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        let key = pkg.into();
        let entry_path = self.entry_path(&key);
        let archive_path = self.path.join(format!("{key}{archive_extension}"));

        let rw_lock = CacheRwLock::acquire(&entry_path).await?;
        let (revision, stored_sha256) = rw_lock.read_metadata()?;

        let validate_index = reporter.as_ref().map(|r| r.on_validate_start());
        let is_valid = entry_path.is_dir()
            && stored_sha256 == key.sha256()
            && validate_package_directory(&entry_path).is_ok();
        if let (Some(r), Some(idx)) = (&reporter, validate_index) {
            r.on_validate_complete(idx);
        }

        if is_valid {
            return Ok(CacheLock {
                _lock: rw_lock,
                revision,
                sha256: stored_sha256,
                path: entry_path,
            });
        }

        let download_index = reporter.as_ref().map(|r| r.on_download_start());
        fetch(archive_path.clone())
            .await
            .map_err(|e| PackageCacheError::FetchError(Arc::new(e)))?;
        if let (Some(r), Some(idx)) = (&reporter, download_index) {
            r.on_download_completed(idx);
        }

        if entry_path.exists() {
            tokio::fs::remove_dir_all(&entry_path)
                .await
                .map_err(|e| {
                    PackageCacheError::LockError(
                        format!("failed to clear stale cache entry: '{}'", entry_path.display()),
                        e,
                    )
                })?;
        }
        rattler_package_streaming::tokio::extract(&archive_path, &entry_path)
            .await
            .map_err(|e| PackageCacheError::FetchError(Arc::new(e)))?;
        validate_package_directory(&entry_path).map_err(|e| PackageCacheError::FetchError(Arc::new(e)))?;

        let new_revision = revision + 1;
        rw_lock.write_metadata(new_revision, key.sha256().as_ref())?;

        Ok(CacheLock {
            _lock: rw_lock,
            revision: new_revision,
            sha256: key.sha256(),
            path: entry_path,
        })
    }

    /// Ensures `path` (a local package archive) is extracted into the cache, returning a lock on
    /// the resulting directory.
    pub async fn get_or_fetch_from_path(
        &self,
        path: &Path,
        sha256: Option<rattler_digest::Sha256Hash>,
        reporter: Option<Arc<dyn CacheReporter>>,
    ) -> Result<CacheLock, PackageCacheError> {
        let archive_type = rattler_package_streaming::ArchiveType::try_from(path).ok_or_else(|| {
            PackageCacheError::FetchError(Arc::new(PackageFetchError::UnrecognizedFilename(
                path.to_path_buf(),
            )))
        })?;
        let key = CacheKey::try_from_path(path)
            .ok_or_else(|| {
                PackageCacheError::FetchError(Arc::new(PackageFetchError::UnrecognizedFilename(
                    path.to_path_buf(),
                )))
            })?
            .with_opt_sha256(sha256);
        let source = path.to_path_buf();
        self.get_or_fetch(
            key,
            archive_type.extension(),
            move |dest| {
                let source = source.clone();
                async move {
                    tokio::fs::copy(&source, &dest).await?;
                    Ok::<_, std::io::Error>(())
                }
            },
            reporter,
        )
        .await
    }

    /// Ensures the package archive at `url` is downloaded (via `fetcher`) and extracted into the
    /// cache, returning a lock on the resulting directory.
    pub async fn get_or_fetch_from_url(
        &self,
        url: &Url,
        fetcher: Arc<Fetcher>,
        sha256: Option<rattler_digest::Sha256Hash>,
        reporter: Option<Arc<dyn CacheReporter>>,
    ) -> Result<CacheLock, PackageCacheError> {
        let filename = url
            .path_segments()
            .and_then(Iterator::last)
            .ok_or_else(|| PackageCacheError::FetchError(Arc::new(PackageFetchError::UnsupportedArchiveType(url.clone()))))?;
        let archive_type = rattler_package_streaming::ArchiveType::try_from(filename).ok_or_else(|| {
            PackageCacheError::FetchError(Arc::new(PackageFetchError::UnsupportedArchiveType(
                url.clone(),
            )))
        })?;
        let key = CacheKey::try_from_url(url)
            .ok_or_else(|| {
                PackageCacheError::FetchError(Arc::new(PackageFetchError::UnsupportedArchiveType(
                    url.clone(),
                )))
            })?
            .with_opt_sha256(sha256);
        let url = url.clone();
        let cancel = tokio_util::sync::CancellationToken::new();
        self.get_or_fetch(
            key,
            archive_type.extension(),
            move |dest| {
                let url = url.clone();
                let fetcher = fetcher.clone();
                let cancel = cancel.clone();
                async move {
                    let mut request = Request::new(url.to_string(), url.clone(), dest);
                    if let Some(sha256) = sha256 {
                        request = request.with_expected_sha256(sha256);
                    }
                    fetcher
                        .fetch(&request, &cancel)
                        .await
                        .map_err(PackageFetchError::Fetch)?;
                    Ok::<_, PackageFetchError>(())
                }
            },
            reporter,
        )
        .await
    }
}

/// Errors specific to the convenience `get_or_fetch_from_{path,url}` wrappers, surfaced to
/// callers wrapped in [`PackageCacheError::FetchError`].
#[derive(Debug, thiserror::Error)]
pub enum PackageFetchError {
    /// The archive's filename doesn't end in a recognized extension.
    #[error("'{0}' does not have a recognized package archive extension")]
    UnrecognizedFilename(PathBuf),
    /// The URL's final path segment doesn't end in a recognized extension.
    #[error("'{0}' does not point at a recognized package archive")]
    UnsupportedArchiveType(Url),
    /// Downloading the archive failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Extracting the archive failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageCache").field("path", &self.path).finish()
    }
}
