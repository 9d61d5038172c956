#![deny(missing_docs)]

//! Fetches and caches per-subdir conda repodata indexes (C8).
//!
//! [`SubdirLoader`] brings a single `(channel, platform)` pair from an on-disk cache (or a fresh
//! network fetch) to a flat list of [`rattler_conda_types::RepoDataRecord`]s, in either
//! traditional (single `repodata.json`) or sharded (per-package-name, incrementally fetched)
//! form. [`download_required_indexes`] drives a batch of loaders concurrently, sharing one
//! [`rattler_networking::Fetcher`] across all of them.

mod loader;
mod native;
mod shard;
mod state;

pub use loader::{download_required_indexes, DownloadOptions, SubdirLoader, SubdirParams};
pub use shard::{Shard, ShardedRepodata, ShardedSubdirInfo};
pub use state::{Expiring, RepoDataState};

use url::Url;

/// Errors produced while loading or caching a subdir's index.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Downloading a repodata file, shard index, or shard failed.
    #[error(transparent)]
    Fetch(#[from] rattler_networking::FetchError),
    /// An I/O error while reading or writing a cache file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The downloaded (or cached) `repodata.json` could not be parsed.
    #[error(transparent)]
    RepoData(#[from] rattler_conda_types::RepoDataError),
    /// The `.state.json` sidecar could not be (de)serialized.
    #[error(transparent)]
    State(#[from] serde_json::Error),
    /// A shard or shard index failed to decode as msgpack.
    #[error("failed to decode shard: {0}")]
    ShardDecode(#[source] rmp_serde::decode::Error),
    /// A shard or shard index failed to decompress as zstd.
    #[error("failed to decompress shard: {0}")]
    Decompress(#[source] std::io::Error),
    /// The native cache file failed to encode as msgpack.
    #[error("failed to encode native cache: {0}")]
    NativeEncode(#[source] rmp_serde::encode::Error),
    /// Offline mode was requested but no cached copy of this subdir's index exists.
    #[error("offline mode requested but no cached repodata exists for '{0}'")]
    OfflineCacheMiss(Url),
}
