//! Performs the actual network transfer for a [`super::Request`]: conditional GETs, retry with
//! exponential backoff via `reqwest-retry`, mirror failover, and an atomic, hash-verified write.

use futures::StreamExt;
use rattler_digest::{HashingWriter, Md5, Md5Hash, Sha256, Sha256Hash};
use reqwest::header::{HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use rattler_redaction::Redact;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    authentication_storage::authentication::Authentication, mirror::MirrorMap,
    retry::default_retry_policy, AuthenticationStorage,
};

use super::{FetchError, FetchOutcome, Request};

/// Cached alongside a downloaded file so a later request can issue a conditional GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
}

/// Downloads [`Request`]s: resolves a mirror, authenticates the request, retries transient
/// failures with backoff, fails over to the next mirror on a permanent error, and verifies size
/// and hash before the file is considered complete.
pub struct Fetcher {
    client: ClientWithMiddleware,
    auth: AuthenticationStorage,
    mirrors: MirrorMap,
}

impl Fetcher {
    /// Builds a fetcher around a plain [`reqwest::Client`], wrapping it with the default
    /// exponential-backoff retry policy.
    pub fn new(client: reqwest::Client, auth: AuthenticationStorage, mirrors: MirrorMap) -> Self {
        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(
                default_retry_policy(),
            ))
            .build();
        Self { client, auth, mirrors }
    }

    /// Downloads `request`, trying mirrors in order of fewest observed failures and falling
    /// back to [`Request::fallback_url`] when no mirror is configured.
    pub async fn fetch(&self, request: &Request, cancel: &CancellationToken) -> Result<FetchOutcome, FetchError> {
        let mut candidates = if request.mirror_name.is_empty() {
            Vec::new()
        } else {
            self.mirrors.candidates(&request.mirror_name, &request.relative_path)
        };
        if candidates.is_empty() {
            candidates.push(request.fallback_url.clone());
        }

        let mut last_error = None;
        let candidate_count = candidates.len();
        for (i, url) in candidates.into_iter().enumerate() {
            match self.fetch_one(&url, request, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    let is_last = i + 1 == candidate_count;
                    if !request.mirror_name.is_empty() {
                        self.mirrors.record_failure(&request.mirror_name, &url);
                    }
                    if matches!(err, FetchError::Cancelled(_)) || !err.is_failover_eligible() || is_last {
                        last_error = Some(err);
                        break;
                    }
                    tracing::debug!(
                        "mirror {} failed for {}, trying next: {err}",
                        url.clone().redact(),
                        request.name
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(match last_error {
            Some(err) if candidate_count > 1 => FetchError::AllMirrorsFailed {
                name: request.name.clone(),
                last_error: Box::new(err),
            },
            Some(err) => err,
            None => unreachable!("candidates is never empty"),
        })
    }

    async fn fetch_one(
        &self,
        url: &Url,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled(request.name.clone()));
        }

        let meta_path = request.target_path.with_extension(
            request
                .target_path
                .extension()
                .map(|e| format!("{}.meta.json", e.to_string_lossy()))
                .unwrap_or_else(|| "meta.json".to_string()),
        );
        let cached_meta = read_cache_metadata(&meta_path, url);

        let (url, auth) = self.authenticate(url);
        let mut builder = self.client.get(url.clone());
        if let Some(meta) = &cached_meta {
            if let Some(etag) = meta.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                builder = builder.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = meta
                .last_modified
                .as_deref()
                .and_then(|v| HeaderValue::from_str(v).ok())
            {
                builder = builder.header(IF_MODIFIED_SINCE, last_modified);
            }
        }
        if let Some(Authentication::BearerToken(token)) = &auth {
            builder = builder.bearer_auth(token);
        }
        if let Some(Authentication::BasicHttp { username, password }) = &auth {
            builder = builder.basic_auth(username, Some(password));
        }

        let response = builder.send().await?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome { bytes_downloaded: 0, not_modified: true });
        }
        let response = response.error_for_status()?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let part_path = request.target_path.with_extension(
            request
                .target_path
                .extension()
                .map(|e| format!("{}.part", e.to_string_lossy()))
                .unwrap_or_else(|| "part".to_string()),
        );
        if let Some(parent) = request.target_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let bytes_downloaded =
            stream_to_file(response, &part_path, request, cancel).await?;

        fs_err::rename(&part_path, &request.target_path)?;
        if etag.is_some() || last_modified.is_some() {
            let _ = write_cache_metadata(
                &meta_path,
                &CacheMetadata { url: url.to_string(), etag, last_modified },
            );
        }

        Ok(FetchOutcome { bytes_downloaded, not_modified: false })
    }

    /// Looks up credentials for `url` and, for a conda token, rewrites the URL to carry it as a
    /// `/t/<token>/` path segment. Other credential kinds are applied to the request builder by
    /// the caller instead, since they don't change the URL itself.
    fn authenticate(&self, url: &Url) -> (Url, Option<Authentication>) {
        let Some(auth) = self.auth.get_by_url(url) else {
            return (url.clone(), None);
        };
        match &auth {
            Authentication::CondaToken(token) => {
                let mut url = url.clone();
                let new_path = format!("/t/{token}{path}", path = url.path());
                url.set_path(&new_path);
                (url, Some(auth))
            }
            _ => (url.clone(), Some(auth)),
        }
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    part_path: &std::path::Path,
    request: &Request,
    cancel: &CancellationToken,
) -> Result<u64, FetchError> {
    let file = std::fs::File::create(part_path)?;
    let mut sha256_writer = HashingWriter::<_, Sha256>::new(file);
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled(request.name.clone()));
        }
        let chunk = chunk?;
        std::io::Write::write_all(&mut sha256_writer, &chunk)?;
        bytes_downloaded += chunk.len() as u64;
    }
    std::io::Write::flush(&mut sha256_writer)?;
    let (file, sha256) = sha256_writer.finalize();
    file.sync_all()?;

    if let Some(expected_size) = request.expected_size {
        if expected_size != bytes_downloaded {
            let _ = std::fs::remove_file(part_path);
            return Err(FetchError::SizeMismatch {
                name: request.name.clone(),
                expected: expected_size,
                actual: bytes_downloaded,
            });
        }
    }
    verify_sha256(request, &sha256)?;
    if request.expected_md5.is_some() {
        verify_md5(request, part_path)?;
    }

    Ok(bytes_downloaded)
}

fn verify_sha256(request: &Request, actual: &Sha256Hash) -> Result<(), FetchError> {
    let Some(expected) = &request.expected_sha256 else {
        return Ok(());
    };
    if expected != actual {
        return Err(FetchError::HashMismatch {
            name: request.name.clone(),
            algorithm: "sha256",
            expected: format!("{expected:x}"),
            actual: format!("{actual:x}"),
        });
    }
    Ok(())
}

fn verify_md5(request: &Request, part_path: &std::path::Path) -> Result<(), FetchError> {
    let expected = request.expected_md5.as_ref().expect("checked by caller");
    let actual: Md5Hash = rattler_digest::compute_file_digest::<Md5>(part_path)?;
    if *expected != actual {
        return Err(FetchError::HashMismatch {
            name: request.name.clone(),
            algorithm: "md5",
            expected: format!("{expected:x}"),
            actual: format!("{actual:x}"),
        });
    }
    Ok(())
}

fn read_cache_metadata(meta_path: &std::path::Path, url: &Url) -> Option<CacheMetadata> {
    let contents = std::fs::read(meta_path).ok()?;
    let metadata: CacheMetadata = serde_json::from_slice(&contents).ok()?;
    (metadata.url == url.as_str()).then_some(metadata)
}

fn write_cache_metadata(meta_path: &std::path::Path, metadata: &CacheMetadata) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(metadata)?;
    fs_err::write(meta_path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorMap;
    use axum::{routing::get, Router};
    use std::collections::HashMap;
    use tempfile::tempdir;

    async fn spawn_server(body: &'static str) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let app = Router::new().route("/file.txt", get(|| async { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_fetch_writes_target_file() {
        let (addr, _server) = spawn_server("hello world").await;
        let dir = tempdir().unwrap();
        let target = dir.path().join("file.txt");

        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            AuthenticationStorage::empty(),
            MirrorMap::from_map(HashMap::new()),
        );
        let url = Url::parse(&format!("http://{addr}/file.txt")).unwrap();
        let request = Request::new("file.txt", url, target.clone());

        let outcome = fetcher.fetch(&request, &CancellationToken::new()).await.unwrap();
        assert!(!outcome.not_modified);
        assert_eq!(outcome.bytes_downloaded, "hello world".len() as u64);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_fetch_rejects_size_mismatch() {
        let (addr, _server) = spawn_server("hello world").await;
        let dir = tempdir().unwrap();
        let target = dir.path().join("file.txt");

        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            AuthenticationStorage::empty(),
            MirrorMap::from_map(HashMap::new()),
        );
        let url = Url::parse(&format!("http://{addr}/file.txt")).unwrap();
        let request = Request::new("file.txt", url, target.clone()).with_expected_size(999);

        let err = fetcher.fetch(&request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::SizeMismatch { .. }));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_fetch_rejects_sha256_mismatch() {
        let (addr, _server) = spawn_server("hello world").await;
        let dir = tempdir().unwrap();
        let target = dir.path().join("file.txt");

        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            AuthenticationStorage::empty(),
            MirrorMap::from_map(HashMap::new()),
        );
        let url = Url::parse(&format!("http://{addr}/file.txt")).unwrap();
        let bogus_hash = rattler_digest::compute_bytes_digest::<Sha256>("not the right content");
        let request = Request::new("file.txt", url, target.clone()).with_expected_sha256(bogus_hash);

        let err = fetcher.fetch(&request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::HashMismatch { algorithm: "sha256", .. }));
    }

    #[tokio::test]
    async fn test_fetch_honors_cancellation() {
        let (addr, _server) = spawn_server("hello world").await;
        let dir = tempdir().unwrap();
        let target = dir.path().join("file.txt");

        let fetcher = Fetcher::new(
            reqwest::Client::new(),
            AuthenticationStorage::empty(),
            MirrorMap::from_map(HashMap::new()),
        );
        let url = Url::parse(&format!("http://{addr}/file.txt")).unwrap();
        let request = Request::new("file.txt", url, target.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher.fetch(&request, &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled(_)));
    }
}
