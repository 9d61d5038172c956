//! Types for sharded repodata: a per-subdir index mapping package name to shard hash, and the
//! individual, msgpack+zstd encoded shards it points at. Grounded on the equivalent types in
//! `rattler_conda_types`, but keyed by plain filename strings rather than a dedicated
//! archive-identifier type, and without wheel-package support.

use std::collections::{BTreeMap, BTreeSet};

use rattler_conda_types::PackageRecord;
use rattler_digest::{serde::SerializableHash, Sha256, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use url::Url;

/// The shard index for one subdir: `<channel>/<subdir>/repodata_shards.msgpack.zst`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardedRepodata {
    /// Metadata about the sharded subdirectory, such as where to resolve shard/package urls.
    pub info: ShardedSubdirInfo,
    /// The individual shards, indexed by package name.
    #[serde_as(as = "BTreeMap<_, SerializableHash<Sha256>>")]
    pub shards: BTreeMap<String, Sha256Hash>,
}

/// Metadata about a sharded subdirectory, stored inside the shard index itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardedSubdirInfo {
    /// The subdirectory name, e.g. `linux-64`.
    pub subdir: String,
    /// The base url packages referenced by shards are resolved relative to.
    pub base_url: String,
    /// The base url individual shard files are fetched from.
    pub shards_base_url: String,
    /// When this index was generated, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A single shard: every package record for one package name within a subdir, as stored at
/// `<shards_base_url>/shards/<hash>.msgpack.zst`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shard {
    /// Records for `.tar.bz2` packages, keyed by filename.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
    /// Records for `.conda` packages, keyed by filename.
    #[serde(rename = "packages.conda", default)]
    pub conda_packages: BTreeMap<String, PackageRecord>,
    /// Filenames removed from this shard since it was first published.
    #[serde(default)]
    pub removed: BTreeSet<String>,
}

impl Shard {
    /// Iterates over every package record in this shard (both `.tar.bz2` and `.conda`), skipping
    /// anything listed in [`Shard::removed`].
    pub fn records(&self) -> impl Iterator<Item = (&str, &PackageRecord)> {
        self.packages
            .iter()
            .chain(self.conda_packages.iter())
            .filter(|(filename, _)| !self.removed.contains(filename.as_str()))
            .map(|(filename, record)| (filename.as_str(), record))
    }

    /// Every package name this shard's records depend on or constrain, deduplicated.
    pub fn dependency_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (_, record) in self.records() {
            for spec in record.depends.iter().chain(record.constrains.iter()) {
                if let Some(name) = spec.split_whitespace().next() {
                    names.insert(name.to_string());
                }
            }
        }
        names
    }
}

/// Decodes a zstd-compressed msgpack-encoded byte slice into `T`.
pub(crate) fn decode_zst_msgpack<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, crate::GatewayError> {
    let decoded = zstd::decode_all(bytes).map_err(crate::GatewayError::Decompress)?;
    rmp_serde::from_slice(&decoded).map_err(crate::GatewayError::ShardDecode)
}

/// Returns `url` with a guaranteed trailing slash, so it can be safely joined against a
/// relative path.
pub(crate) fn with_trailing_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut url = url.clone();
        url.set_path(&format!("{}/", url.path()));
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_names_skips_removed() {
        let mut shard = Shard::default();
        let record_json = serde_json::json!({
            "name": "foo",
            "version": "1.0",
            "build": "0",
            "build_number": 0,
            "platform": "linux-64",
            "depends": ["bar >=1.0", "baz"],
            "constrains": ["qux <2"]
        });
        let record: PackageRecord = serde_json::from_value(record_json).unwrap();
        shard.packages.insert("foo-1.0-0.tar.bz2".to_string(), record.clone());
        shard.conda_packages.insert("foo-1.0-0.conda".to_string(), record);
        shard.removed.insert("foo-1.0-0.conda".to_string());

        let names = shard.dependency_names();
        assert!(names.contains("bar"));
        assert!(names.contains("baz"));
        assert!(names.contains("qux"));

        let filenames: Vec<_> = shard.records().map(|(f, _)| f).collect();
        assert_eq!(filenames, vec!["foo-1.0-0.tar.bz2"]);
    }

    #[test]
    fn test_with_trailing_slash() {
        let url = Url::parse("https://example.com/conda-forge/linux-64").unwrap();
        assert_eq!(with_trailing_slash(&url).as_str(), "https://example.com/conda-forge/linux-64/");
        let already = Url::parse("https://example.com/conda-forge/linux-64/").unwrap();
        assert_eq!(with_trailing_slash(&already).as_str(), already.as_str());
    }
}
