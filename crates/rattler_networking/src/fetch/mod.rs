//! The HTTP fetcher (C5/C6): mirror selection, conditional GETs, retry with backoff, and
//! atomic, hash-verified writes to disk.

mod http;

use std::path::PathBuf;

use rattler_digest::{Md5Hash, Sha256Hash};
use rattler_redaction::Redact;
use url::Url;

pub use self::http::Fetcher;

/// A single download: where to get it, where to put it, and what it's expected to look like
/// once it arrives.
#[derive(Debug, Clone)]
pub struct Request {
    /// A human-readable name for the thing being fetched, used in error messages and tracing.
    pub name: String,
    /// The key into the [`crate::mirror::MirrorMap`] this request's mirrors are registered
    /// under (typically a channel id). Requests for channels with no configured mirrors fall
    /// back to `fallback_url` unmodified.
    pub mirror_name: String,
    /// The path relative to each mirror's base URL, joined to select a concrete mirror URL.
    pub relative_path: String,
    /// The URL to use when no mirror is configured for `mirror_name`.
    pub fallback_url: Url,
    /// Where the downloaded content is written. The fetcher always stages to
    /// `target_path` + `.part` first and renames atomically on success.
    pub target_path: PathBuf,
    /// If known, the expected size in bytes. Verified before the hash.
    pub expected_size: Option<u64>,
    /// If known, the expected SHA256 of the content.
    pub expected_sha256: Option<Sha256Hash>,
    /// If known, the expected MD5 of the content.
    pub expected_md5: Option<Md5Hash>,
}

impl Request {
    /// Creates a request with no integrity expectations set; add them with the `with_*`
    /// builder methods before passing it to [`Fetcher::fetch`].
    pub fn new(name: impl Into<String>, fallback_url: Url, target_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            mirror_name: String::new(),
            relative_path: String::new(),
            fallback_url,
            target_path,
            expected_size: None,
            expected_sha256: None,
            expected_md5: None,
        }
    }

    /// Registers this request under `mirror_name`/`relative_path` so the fetcher consults the
    /// mirror map before falling back to [`Request::fallback_url`].
    pub fn with_mirror(mut self, mirror_name: impl Into<String>, relative_path: impl Into<String>) -> Self {
        self.mirror_name = mirror_name.into();
        self.relative_path = relative_path.into();
        self
    }

    /// Sets the expected size in bytes.
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Sets the expected SHA256 hash.
    pub fn with_expected_sha256(mut self, sha256: Sha256Hash) -> Self {
        self.expected_sha256 = Some(sha256);
        self
    }

    /// Sets the expected MD5 hash.
    pub fn with_expected_md5(mut self, md5: Md5Hash) -> Self {
        self.expected_md5 = Some(md5);
        self
    }
}

/// What happened as a result of a successful [`Fetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The number of bytes transferred over the network. Zero on a conditional-GET cache hit.
    pub bytes_downloaded: u64,
    /// True if the server reported the cached copy was still valid (a `304 Not Modified`),
    /// meaning `target_path` was left untouched.
    pub not_modified: bool,
}

/// An error produced while fetching a [`Request`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A transport-level error from `reqwest`.
    #[error(transparent)]
    Reqwest(reqwest::Error),
    /// A transport-level error from the retrying middleware client.
    #[error(transparent)]
    ReqwestMiddleware(reqwest_middleware::Error),
    /// An I/O error while staging or renaming the downloaded file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The downloaded content's size didn't match what the caller expected.
    #[error("size mismatch for {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The request's name.
        name: String,
        /// The expected size.
        expected: u64,
        /// The size actually downloaded.
        actual: u64,
    },
    /// The downloaded content's hash didn't match what the caller expected.
    #[error("{algorithm} mismatch for {name}: expected {expected}, got {actual}")]
    HashMismatch {
        /// The request's name.
        name: String,
        /// `"sha256"` or `"md5"`.
        algorithm: &'static str,
        /// The expected hash, hex-encoded.
        expected: String,
        /// The actual hash, hex-encoded.
        actual: String,
    },
    /// Every configured mirror (and the fallback URL) failed.
    #[error("all mirrors failed for {name}: {last_error}")]
    AllMirrorsFailed {
        /// The request's name.
        name: String,
        /// The error from the last mirror tried.
        last_error: Box<FetchError>,
    },
    /// The request was cancelled via its [`tokio_util::sync::CancellationToken`].
    #[error("fetch of {0} was cancelled")]
    Cancelled(String),
}

impl From<reqwest::Error> for FetchError {
    /// Any URL carried by the error is redacted before it is stored, so a logged or displayed
    /// [`FetchError`] never leaks a conda token or basic-auth password.
    fn from(err: reqwest::Error) -> Self {
        FetchError::Reqwest(err.redact())
    }
}

impl From<reqwest_middleware::Error> for FetchError {
    /// See [`From<reqwest::Error>`] for `FetchError` — the same redaction applies here.
    fn from(err: reqwest_middleware::Error) -> Self {
        FetchError::ReqwestMiddleware(err.redact())
    }
}

impl FetchError {
    /// Whether this error represents a transient condition worth failing over to the next
    /// mirror (as opposed to a permanent one like a hash mismatch, which would fail on every
    /// mirror identically and should be surfaced immediately).
    pub(crate) fn is_failover_eligible(&self) -> bool {
        matches!(
            self,
            FetchError::Reqwest(_) | FetchError::ReqwestMiddleware(_) | FetchError::Io(_)
        )
    }
}
