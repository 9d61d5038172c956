//! The `.state.json` sidecar written next to a cached `repodata.json`: just enough about the
//! last successful fetch to decide, without hitting the network, whether the cached copy is
//! still worth trusting.

use std::{
    path::Path,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::GatewayError;

/// Cache metadata for a single subdir's repodata, persisted alongside the `repodata.json` (or
/// native cache) it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDataState {
    /// The exact URL the cached file was downloaded from (e.g. ending in `repodata.json` or
    /// `repodata.json.zst`).
    pub url: Url,
    /// The `ETag` response header from the last successful fetch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// The `Last-Modified` response header from the last successful fetch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// The size in bytes of the cached (decompressed) `repodata.json` on disk.
    pub size: u64,
    /// The modification time of the cached `repodata.json` on disk, used to compute TTL
    /// staleness.
    #[serde(
        rename = "mtime",
        deserialize_with = "mtime_from_nanos",
        serialize_with = "mtime_to_nanos"
    )]
    pub mtime: SystemTime,
    /// Whether a `.zst` variant was seen to be available, and when that was last checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_zst: Option<Expiring<bool>>,
    /// Whether a shard index was seen to be available, and when that was last checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_shards: Option<Expiring<bool>>,
}

impl RepoDataState {
    /// Reads and parses a `.state.json` file from disk.
    pub fn from_path(path: &Path) -> Result<Self, GatewayError> {
        let content = fs_err::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes this state to `path` as pretty JSON.
    pub fn to_path(&self, path: &Path) -> Result<(), GatewayError> {
        let content = serde_json::to_string_pretty(self)?;
        fs_err::write(path, content)?;
        Ok(())
    }

    /// Whether the cached repodata this state describes should be considered stale given `ttl`.
    ///
    /// A `ttl` of zero always reports stale, matching the "always refetch" contract.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return true;
        }
        match SystemTime::now().duration_since(self.mtime) {
            Ok(age) => age >= ttl,
            Err(_) => false,
        }
    }
}

/// A value paired with when it was last determined to be true, so a caller can decide whether
/// it's worth re-checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expiring<T> {
    /// The value as of `last_checked`.
    pub value: T,
    /// When `value` was last confirmed.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_checked: chrono::DateTime<chrono::Utc>,
}

impl<T> Expiring<T> {
    /// Wraps `value`, marking it as checked right now.
    pub fn now(value: T) -> Self {
        Self {
            value,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Returns the value if it was checked more recently than `expiration` ago.
    pub fn value(&self, expiration: chrono::Duration) -> Option<&T> {
        if chrono::Utc::now().signed_duration_since(self.last_checked) >= expiration {
            None
        } else {
            Some(&self.value)
        }
    }
}

fn mtime_from_nanos<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    SystemTime::UNIX_EPOCH
        .checked_add(Duration::from_nanos(u64::deserialize(deserializer)?))
        .ok_or_else(|| D::Error::custom("mtime cannot be represented internally"))
}

fn mtime_to_nanos<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::Error;
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| S::Error::custom("mtime predates the unix epoch"))?
        .as_nanos()
        .serialize(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repodata.state.json");
        let state = RepoDataState {
            url: Url::parse("https://conda.anaconda.org/conda-forge/linux-64/repodata.json.zst").unwrap(),
            etag: Some("\"abc\"".to_string()),
            last_modified: Some("Mon, 13 Feb 2023 13:49:56 GMT".to_string()),
            size: 1234,
            mtime: SystemTime::now(),
            has_zst: Some(Expiring::now(true)),
            has_shards: None,
        };
        state.to_path(&path).unwrap();
        let read_back = RepoDataState::from_path(&path).unwrap();
        assert_eq!(state.url, read_back.url);
        assert_eq!(state.etag, read_back.etag);
        assert_eq!(state.size, read_back.size);
        assert!(read_back.has_zst.unwrap().value(chrono::Duration::hours(1)).is_some());
    }

    #[test]
    fn test_ttl_zero_always_stale() {
        let state = RepoDataState {
            url: Url::parse("https://example.com/repodata.json").unwrap(),
            etag: None,
            last_modified: None,
            size: 0,
            mtime: SystemTime::now(),
            has_zst: None,
            has_shards: None,
        };
        assert!(state.is_stale(Duration::ZERO));
    }

    #[test]
    fn test_fresh_state_not_stale() {
        let state = RepoDataState {
            url: Url::parse("https://example.com/repodata.json").unwrap(),
            etag: None,
            last_modified: None,
            size: 0,
            mtime: SystemTime::now(),
            has_zst: None,
            has_shards: None,
        };
        assert!(!state.is_stale(Duration::from_secs(3600)));
    }
}
