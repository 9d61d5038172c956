//! The crate-root error taxonomy (§7): one row per error kind in the table, each variant
//! wrapping a component-level `thiserror` enum via `#[from]`.

use std::path::PathBuf;

use rattler_conda_types::{MatchSpec, ParseMatchSpecError};
use rattler_solve::BackendError;
use url::Url;

use crate::driver::ProblemReport;

/// The aggregate error type for this crate: every public operation that can fail returns one of
/// these variants (or a more specific error that converts into it via `#[from]`).
#[derive(Debug, thiserror::Error)]
pub enum RattlerError {
    /// A spec string, version, or channel name failed to parse.
    #[error("failed to parse {what} {input:?}: {detail}")]
    Parse {
        /// What kind of thing failed to parse (`"match spec"`, `"pin"`, …).
        what: &'static str,
        /// The offending input.
        input: String,
        /// A human-readable explanation.
        detail: String,
    },

    /// A filesystem operation failed.
    #[error("io error at {path}: {cause}")]
    Io {
        /// The path the operation was performed on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        cause: std::io::Error,
    },

    /// A network transfer failed and no more retries or mirrors remain.
    #[error("network error fetching {url}: {cause}")]
    Network {
        /// The url that failed.
        url: Url,
        /// The underlying fetch error.
        #[source]
        cause: rattler_networking::FetchError,
    },

    /// A cached file was corrupt (failed to parse, or a hash mismatch) and the one allowed
    /// retry-after-clearing also failed.
    #[error("cache at {path} is corrupted: {detail}")]
    CacheCorrupted {
        /// The cache file that was corrupt.
        path: PathBuf,
        /// A human-readable explanation.
        detail: String,
    },

    /// The request could not be satisfied by the solver.
    #[error("cannot solve: {}", report.render())]
    Unsolvable {
        /// The rendered problem tree (§4.7).
        report: ProblemReport,
    },

    /// Linking a file found a pre-existing file not owned by this package.
    #[error("refusing to overwrite {path}: not owned by the package being installed")]
    Conflict {
        /// The path that already existed.
        path: PathBuf,
    },

    /// The operation was cancelled by the caller.
    #[error("operation was interrupted by the user")]
    UserInterrupted,

    /// The target prefix does not exist or has no `conda-meta` directory.
    #[error("prefix not found at {path}")]
    PrefixNotFound {
        /// The prefix path that was missing.
        path: PathBuf,
    },

    /// A file or prefix-directory advisory lock could not be acquired before the configured
    /// timeout.
    #[error("timed out waiting for a lock on {path}")]
    LockTimeout {
        /// The path the lock was being acquired for.
        path: PathBuf,
    },

    /// Failed to add a repository or solve because the backend rejected the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The package cache could not produce a valid, extracted package directory.
    #[error(transparent)]
    Cache(#[from] rattler_cache::package_cache::PackageCacheError),

    /// Appending an entry to `conda-meta/history` failed.
    #[error(transparent)]
    History(#[from] rattler_conda_types::HistoryError),
}

impl RattlerError {
    /// Builds a [`RattlerError::Parse`] for a match-spec string, from a
    /// [`rattler_conda_types::ParseMatchSpecError`].
    pub fn parse_match_spec(input: &str, err: ParseMatchSpecError) -> Self {
        RattlerError::Parse {
            what: "match spec",
            input: input.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Parses `input` as a [`MatchSpec`], wrapping a parse failure as a [`RattlerError::Parse`].
pub(crate) fn parse_match_spec(input: &str) -> Result<MatchSpec, RattlerError> {
    input
        .parse()
        .map_err(|err| RattlerError::parse_match_spec(input, err))
}
