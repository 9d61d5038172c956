//! The per-subdir index loader (C8): brings a single `(channel, platform)` pair from nothing to
//! a usable set of [`RepoDataRecord`]s, either by trusting a fresh cache or by fetching and
//! caching a new copy — in traditional (`repodata.json`) or sharded form.

use std::{
    collections::{BTreeSet, VecDeque},
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use rattler_conda_types::{Channel, PackageName, Platform, RepoData, RepoDataRecord};
use rattler_digest::{compute_bytes_digest, Sha256};
use rattler_networking::{AuthenticationStorage, Fetcher, MirrorMap, Request};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::{
    native::{self, NativeOrigin},
    shard::{decode_zst_msgpack, with_trailing_slash, ShardedRepodata},
    state::{Expiring, RepoDataState},
    GatewayError,
};

/// Per-subdir fetch configuration.
#[derive(Debug, Clone)]
pub struct SubdirParams {
    /// Use sharded indexes when the channel advertises a shard index and [`SubdirParams::roots`]
    /// is non-empty.
    pub use_shards: bool,
    /// Package names to seed the sharded dependency walk from (typically the names directly
    /// requested by the solve that will consume this subdir).
    pub roots: Vec<PackageName>,
    /// How long a cached index may go unchecked before a fresh fetch is attempted. Zero always
    /// refetches.
    pub ttl: Duration,
    /// Never perform a network operation; serve from the existing cache or fail.
    pub offline: bool,
}

impl Default for SubdirParams {
    fn default() -> Self {
        Self {
            use_shards: false,
            roots: Vec::new(),
            ttl: Duration::from_secs(3600),
            offline: false,
        }
    }
}

/// Settings shared across a batch of loaders passed to
/// [`download_required_indexes`].
#[derive(Clone)]
pub struct DownloadOptions {
    /// The HTTP client the batch's [`Fetcher`] is built from.
    pub client: reqwest::Client,
    /// The mirror-map key requests for these subdirs are registered under.
    pub mirror_name: String,
}

#[derive(Debug)]
enum LoaderState {
    New,
    Ready(Vec<RepoDataRecord>),
}

/// Loads and caches one subdir's package index. Constructed with [`SubdirLoader::create`] in the
/// `New` state; call [`download_required_indexes`] (possibly across many loaders at once) to
/// bring it to `Ready`, then read the result with [`SubdirLoader::records`].
pub struct SubdirLoader {
    channel: Channel,
    platform: Platform,
    cache_dir: PathBuf,
    params: SubdirParams,
    state: tokio::sync::Mutex<LoaderState>,
}

impl SubdirLoader {
    /// Creates a loader for one `(channel, platform)` pair. Performs no I/O.
    pub fn create(
        params: SubdirParams,
        channel: Channel,
        platform: Platform,
        cache: impl Into<PathBuf>,
    ) -> Self {
        Self {
            channel,
            platform,
            cache_dir: cache.into().join(rattler_cache::REPODATA_CACHE_DIR),
            params,
            state: tokio::sync::Mutex::new(LoaderState::New),
        }
    }

    /// The channel this loader fetches for.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// The platform (subdir) this loader fetches for.
    pub fn platform(&self) -> Platform {
        self.platform.clone()
    }

    /// The records this loader resolved. Panics if the loader hasn't reached `Ready` yet — call
    /// [`download_required_indexes`] first.
    pub async fn records(&self) -> Vec<RepoDataRecord> {
        match &*self.state.lock().await {
            LoaderState::Ready(records) => records.clone(),
            LoaderState::New => panic!("SubdirLoader::records called before the loader was made ready"),
        }
    }

    fn subdir_url(&self) -> Url {
        with_trailing_slash(&self.channel.platform_url(self.platform.clone()))
    }

    /// A filesystem-safe identifier for this subdir's cache entries: the sha256 of its canonical
    /// url with any trailing slash stripped.
    fn cache_key(&self) -> String {
        let canonical = self.subdir_url();
        let trimmed = canonical.as_str().trim_end_matches('/');
        format!("{:x}", compute_bytes_digest::<Sha256>(trimmed.as_bytes()))
    }

    fn json_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", self.cache_key()))
    }

    fn state_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.state.json", self.cache_key()))
    }

    fn native_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.rmp", self.cache_key()))
    }

    /// Drives this loader to `Ready`, fetching and caching a new index if the one on disk is
    /// missing, stale, or (offline mode) unusable.
    async fn ensure_ready(&self, fetcher: Arc<Fetcher>, mirror_name: &str) -> Result<(), GatewayError> {
        {
            let state = self.state.lock().await;
            if matches!(&*state, LoaderState::Ready(_)) {
                return Ok(());
            }
        }

        fs_err::create_dir_all(&self.cache_dir)?;

        let cached_state = RepoDataState::from_path(&self.state_path()).ok();
        let json_path = self.json_path();

        if self.params.offline {
            if !json_path.is_file() {
                return Err(GatewayError::OfflineCacheMiss(self.subdir_url()));
            }
            let records = self.load_from_json_or_native(cached_state.as_ref()).await?;
            *self.state.lock().await = LoaderState::Ready(records);
            return Ok(());
        }

        let have_fresh_cache = json_path.is_file()
            && cached_state.as_ref().is_some_and(|s| !s.is_stale(self.params.ttl));
        if have_fresh_cache {
            let records = self.load_from_json_or_native(cached_state.as_ref()).await?;
            *self.state.lock().await = LoaderState::Ready(records);
            return Ok(());
        }

        let use_shards = self.params.use_shards && !self.params.roots.is_empty();
        let records = if use_shards {
            match self.fetch_sharded(&fetcher, mirror_name).await {
                Ok(records) => records,
                Err(err) => {
                    warn!(
                        channel = %self.channel.display_name,
                        platform = %self.platform.as_str(),
                        error = %err,
                        "sharded fetch failed, falling back to traditional repodata.json"
                    );
                    self.fetch_traditional(&fetcher, mirror_name, cached_state.as_ref())
                        .await?
                }
            }
        } else {
            self.fetch_traditional(&fetcher, mirror_name, cached_state.as_ref())
                .await?
        };

        *self.state.lock().await = LoaderState::Ready(records);
        Ok(())
    }

    async fn load_from_json_or_native(
        &self,
        state: Option<&RepoDataState>,
    ) -> Result<Vec<RepoDataRecord>, GatewayError> {
        if let Some(state) = state {
            let origin = NativeOrigin {
                url: state.url.to_string(),
                etag: state.etag.clone(),
                last_modified: state.last_modified.clone(),
            };
            if let Some(records) = native::read_if_matching(&self.native_path(), &origin)? {
                return Ok(records);
            }
        }
        let repo_data = RepoData::from_path(self.json_path())?;
        let records = repo_data.into_repo_data_records(&self.channel);
        if let Some(state) = state {
            self.write_native(state, &records)?;
        }
        Ok(records)
    }

    fn write_native(&self, state: &RepoDataState, records: &[RepoDataRecord]) -> Result<(), GatewayError> {
        let origin = NativeOrigin {
            url: state.url.to_string(),
            etag: state.etag.clone(),
            last_modified: state.last_modified.clone(),
        };
        native::write(&self.native_path(), origin, records)
    }

    /// Fetches a single `repodata.json`, preferring `.zst` when a prior probe (or this attempt)
    /// found it available.
    async fn fetch_traditional(
        &self,
        fetcher: &Arc<Fetcher>,
        mirror_name: &str,
        cached_state: Option<&RepoDataState>,
    ) -> Result<Vec<RepoDataRecord>, GatewayError> {
        let subdir_url = self.subdir_url();
        let prefer_zst = cached_state
            .and_then(|s| s.has_zst.as_ref())
            .and_then(|e| e.value(chrono::Duration::hours(24)))
            .copied()
            .unwrap_or(true);

        let cancel = CancellationToken::new();
        let (fetched_url, has_zst, outcome) = if prefer_zst {
            let zst_url = subdir_url.join("repodata.json.zst").expect("valid subdir relative url");
            match self
                .fetch_to(fetcher, &cancel, &zst_url, mirror_name, "repodata.json.zst")
                .await
            {
                Ok(outcome) => (zst_url, true, outcome),
                Err(err) if is_not_found(&err) => {
                    let plain_url = subdir_url.join("repodata.json").expect("valid subdir relative url");
                    let outcome = self
                        .fetch_to(fetcher, &cancel, &plain_url, mirror_name, "repodata.json")
                        .await?;
                    (plain_url, false, outcome)
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            let plain_url = subdir_url.join("repodata.json").expect("valid subdir relative url");
            let outcome = self
                .fetch_to(fetcher, &cancel, &plain_url, mirror_name, "repodata.json")
                .await?;
            (plain_url, false, outcome)
        };

        let staged_path = self.staged_path(has_zst);
        if has_zst && !outcome.not_modified {
            decompress_zst(&staged_path, &self.json_path())?;
        } else if has_zst {
            // Not modified: the previously decompressed json is still the one on disk.
        } else if !outcome.not_modified {
            fs_err::rename(&staged_path, self.json_path())?;
        }

        let metadata = fs_err::metadata(self.json_path())?;
        let new_state = RepoDataState {
            url: fetched_url,
            etag: None,
            last_modified: None,
            size: metadata.len(),
            mtime: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            has_zst: Some(Expiring::now(has_zst)),
            has_shards: cached_state.and_then(|s| s.has_shards.clone()),
        };
        new_state.to_path(&self.state_path())?;

        let repo_data = RepoData::from_path(self.json_path())?;
        let records = repo_data.into_repo_data_records(&self.channel);
        self.write_native(&new_state, &records)?;
        Ok(records)
    }

    fn staged_path(&self, has_zst: bool) -> PathBuf {
        if has_zst {
            self.cache_dir.join(format!("{}.json.zst", self.cache_key()))
        } else {
            self.cache_dir.join(format!("{}.json.part-final", self.cache_key()))
        }
    }

    async fn fetch_to(
        &self,
        fetcher: &Arc<Fetcher>,
        cancel: &CancellationToken,
        url: &Url,
        mirror_name: &str,
        relative_path: &str,
    ) -> Result<rattler_networking::FetchOutcome, rattler_networking::FetchError> {
        let target_path = self.staged_path(relative_path.ends_with(".zst"));
        let request = Request::new(url.to_string(), url.clone(), target_path)
            .with_mirror(mirror_name, relative_path);
        fetcher.fetch(&request, cancel).await
    }

    /// Fetches the shard index and walks the dependency frontier starting from the configured
    /// roots, merging every shard's records into one flat list.
    async fn fetch_sharded(
        &self,
        fetcher: &Arc<Fetcher>,
        mirror_name: &str,
    ) -> Result<Vec<RepoDataRecord>, GatewayError> {
        let cancel = CancellationToken::new();
        let shards_dir = self.cache_dir.join("shards-v1");
        fs_err::create_dir_all(&shards_dir)?;

        let index_url = self.subdir_url().join("repodata_shards.msgpack.zst").expect("valid subdir relative url");
        let index_path = shards_dir.join(format!("{}.index.msgpack.zst", self.cache_key()));
        let request = Request::new(index_url.to_string(), index_url.clone(), index_path.clone())
            .with_mirror(mirror_name, "repodata_shards.msgpack.zst");
        fetcher.fetch(&request, &cancel).await?;
        let index_bytes = fs_err::read(&index_path)?;
        let sharded: ShardedRepodata = decode_zst_msgpack(&index_bytes)?;

        let shards_base_url: Url = sharded
            .info
            .shards_base_url
            .parse()
            .unwrap_or_else(|_| self.subdir_url());
        let packages_base_url: Url = sharded
            .info
            .base_url
            .parse()
            .unwrap_or_else(|_| self.subdir_url());
        let shards_base_url = with_trailing_slash(&shards_base_url);
        let packages_base_url = with_trailing_slash(&packages_base_url);

        let mut frontier: VecDeque<String> = self
            .params
            .roots
            .iter()
            .map(|name| name.as_normalized().to_string())
            .collect();
        if self.params.roots.iter().any(|n| n.as_normalized() == "python") {
            frontier.push_back("pip".to_string());
        }

        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut records = Vec::new();
        let channel_name = self.channel.display_name.clone();

        while let Some(name) = frontier.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(hash) = sharded.shards.get(&name) else {
                continue;
            };
            let shard_cache_path = shards_dir.join(format!("{hash:x}.msgpack.zst"));
            let shard_bytes = if shard_cache_path.is_file() {
                fs_err::read(&shard_cache_path)?
            } else {
                let shard_url = shards_base_url
                    .join(&format!("shards/{hash:x}.msgpack.zst"))
                    .expect("valid shard url");
                let request = Request::new(
                    shard_url.to_string(),
                    shard_url.clone(),
                    shard_cache_path.clone(),
                )
                .with_mirror(mirror_name, format!("shards/{hash:x}.msgpack.zst"));
                fetcher.fetch(&request, &cancel).await?;
                fs_err::read(&shard_cache_path)?
            };
            let shard = decode_zst_msgpack::<crate::Shard>(&shard_bytes)?;

            for name in shard.dependency_names() {
                if !visited.contains(&name) {
                    frontier.push_back(name);
                }
            }
            for (file_name, package_record) in shard.records() {
                records.push(RepoDataRecord {
                    url: packages_base_url.join(file_name).expect("filename is a valid url fragment"),
                    channel: channel_name.clone(),
                    file_name: file_name.to_string(),
                    package_record: package_record.clone(),
                });
            }
        }

        let metadata_size: u64 = records.len() as u64;
        let new_state = RepoDataState {
            url: index_url,
            etag: None,
            last_modified: None,
            size: metadata_size,
            mtime: SystemTime::now(),
            has_zst: None,
            has_shards: Some(Expiring::now(true)),
        };
        self.write_native(&new_state, &records)?;

        Ok(records)
    }
}

fn decompress_zst(src: &std::path::Path, dest: &std::path::Path) -> Result<(), GatewayError> {
    let compressed = fs_err::read(src)?;
    let decoded = zstd::decode_all(compressed.as_slice()).map_err(GatewayError::Decompress)?;
    fs_err::write(dest, decoded)?;
    Ok(())
}

fn is_not_found(err: &rattler_networking::FetchError) -> bool {
    matches!(
        err,
        rattler_networking::FetchError::Reqwest(e) if e.status() == Some(reqwest::StatusCode::NOT_FOUND)
    )
}

/// Brings a batch of loaders to `Ready`, sharing one [`Fetcher`] (and so one mirror map and
/// connection pool) across all of them. Each loader already carries the [`SubdirParams`] it was
/// created with, so this only needs the pieces that are genuinely shared across a whole solve:
/// authentication, mirrors, and the HTTP client.
pub async fn download_required_indexes(
    loaders: &[SubdirLoader],
    auth: &AuthenticationStorage,
    mirrors: MirrorMap,
    download_options: DownloadOptions,
) -> Result<(), GatewayError> {
    let fetcher = Arc::new(Fetcher::new(download_options.client.clone(), auth.clone(), mirrors));
    let mirror_name = download_options.mirror_name.clone();
    futures::future::try_join_all(
        loaders
            .iter()
            .map(|loader| loader.ensure_ready(fetcher.clone(), &mirror_name)),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rattler_conda_types::PackageName;

    fn test_channel() -> Channel {
        Channel::from_url(Url::parse("https://conda.anaconda.org/conda-forge/").unwrap(), None)
    }

    fn dummy_fetcher() -> Arc<Fetcher> {
        Arc::new(Fetcher::new(
            reqwest::Client::new(),
            AuthenticationStorage::default(),
            MirrorMap::default(),
        ))
    }

    #[test]
    fn test_cache_key_is_deterministic_and_path_scoped() {
        let cache = tempfile::tempdir().unwrap();
        let a = SubdirLoader::create(SubdirParams::default(), test_channel(), Platform::Linux64, cache.path());
        let b = SubdirLoader::create(SubdirParams::default(), test_channel(), Platform::Linux64, cache.path());
        assert_eq!(a.cache_key(), b.cache_key());

        let osx = SubdirLoader::create(SubdirParams::default(), test_channel(), Platform::Osx64, cache.path());
        assert_ne!(a.cache_key(), osx.cache_key());
    }

    #[tokio::test]
    async fn test_offline_without_cache_errors() {
        let cache = tempfile::tempdir().unwrap();
        let params = SubdirParams {
            offline: true,
            ..SubdirParams::default()
        };
        let loader = SubdirLoader::create(params, test_channel(), Platform::Linux64, cache.path());
        let err = loader
            .ensure_ready(dummy_fetcher(), "conda-forge")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OfflineCacheMiss(_)));
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetching() {
        let cache = tempfile::tempdir().unwrap();
        let params = SubdirParams {
            ttl: Duration::from_secs(3600),
            ..SubdirParams::default()
        };
        let loader = SubdirLoader::create(params, test_channel(), Platform::Linux64, cache.path());

        fs_err::create_dir_all(&loader.cache_dir).unwrap();
        fs_err::write(
            loader.json_path(),
            serde_json::json!({
                "info": {"subdir": "linux-64"},
                "packages": {
                    "foo-1.0-0.tar.bz2": {
                        "name": "foo",
                        "version": "1.0",
                        "build": "0",
                        "build_number": 0,
                        "platform": "linux-64"
                    }
                },
                "packages.conda": {}
            })
            .to_string(),
        )
        .unwrap();
        let metadata = fs_err::metadata(loader.json_path()).unwrap();
        let state = RepoDataState {
            url: loader.subdir_url().join("repodata.json").unwrap(),
            etag: None,
            last_modified: None,
            size: metadata.len(),
            mtime: metadata.modified().unwrap(),
            has_zst: None,
            has_shards: None,
        };
        state.to_path(&loader.state_path()).unwrap();

        loader
            .ensure_ready(dummy_fetcher(), "conda-forge")
            .await
            .unwrap();
        let records = loader.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].package_record.name, PackageName::new_unchecked("foo"));
    }
}
