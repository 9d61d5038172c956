//! [`RepoData`] is an index of every package binary available in a subdirectory of a channel.
//! [`PackageRecord`] is the per-package entry in that index (`PackageInfo` in the broader design).

use std::collections::BTreeMap;
use std::path::Path;

use rattler_digest::{serde::SerializableHash, Md5Hash, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none};
use url::Url;

use crate::{
    build_spec::BuildNumber, utils::TimestampMs, Channel, NoArchType, PackageName, Version,
};

/// An index of package binaries available in a single `(channel, platform)` subdirectory.
#[derive(Debug, Deserialize, Serialize, Eq, PartialEq, Clone)]
pub struct RepoData {
    /// The channel information contained in the `repodata.json` file.
    pub info: Option<ChannelInfo>,

    /// The `.tar.bz2` packages contained in the file, keyed by filename.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,

    /// The `.conda` packages, kept under a separate key for backwards compatibility with older
    /// conda clients.
    #[serde(default, rename = "packages.conda")]
    pub conda_packages: BTreeMap<String, PackageRecord>,

    /// Filenames that have been removed. The files may still be downloadable but are no longer
    /// installable as regular packages.
    #[serde(default)]
    pub removed: std::collections::BTreeSet<String>,

    /// The version of the repodata format.
    #[serde(rename = "repodata_version")]
    pub version: Option<u64>,
}

/// Information about the subdirectory a [`RepoData`] describes.
#[derive(Debug, Deserialize, Serialize, Eq, PartialEq, Clone)]
pub struct ChannelInfo {
    /// The channel's subdirectory, e.g. `linux-64`.
    pub subdir: String,

    /// The base url package urls are resolved relative to, if not the repodata's own url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// A single entry in [`RepoData`]: one binary distribution of a package.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Deserialize, Serialize, Eq, PartialEq, Clone, Hash)]
pub struct PackageRecord {
    /// The name of the package.
    pub name: PackageName,
    /// The version of the package.
    pub version: Version,
    /// The build string, e.g. `py37h6de7cb9_0`.
    pub build: String,
    /// The build number.
    #[serde(default)]
    pub build_number: BuildNumber,
    /// The channel this record's package originates from, as a stable id (see
    /// [`Channel::id`]).
    #[serde(default)]
    pub channel_id: String,
    /// The platform the package targets, e.g. `linux-64`. `None` for packages whose subdir could
    /// not be determined, distinct from `noarch`.
    pub platform: Option<String>,
    /// Packages that must be installed alongside this one.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Packages this one constrains the version of, without requiring installation.
    #[serde(default)]
    pub constrains: Vec<String>,
    /// Track features, used only to downweight a package relative to others without them.
    #[serde(default)]
    pub track_features: Vec<String>,
    /// Whether and how this package is architecture-independent.
    #[serde(default)]
    pub noarch: NoArchType,
    /// When this entry was created. Timestamps larger than `253_402_300_799` in the source JSON
    /// are milliseconds and already normalized by [`TimestampMs`]'s deserializer.
    pub timestamp: Option<TimestampMs>,
    /// The size of the package archive in bytes.
    pub size: Option<u64>,
    /// The MD5 hash of the package archive.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Md5>>")]
    pub md5: Option<Md5Hash>,
    /// The SHA256 hash of the package archive.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Sha256>>")]
    pub sha256: Option<Sha256Hash>,
    /// The filename of the package archive within its subdir.
    #[serde(default)]
    pub filename: String,
    /// The canonical URL this package was (or would be) downloaded from.
    pub package_url: Option<Url>,
    /// The license of the package.
    pub license: Option<String>,
    /// Signatures attesting to this record's authenticity, if the channel publishes any.
    pub signatures: Option<serde_json::Value>,
}

impl PackageRecord {
    /// Returns the key that identifies this package for cache addressing purposes: the sha256
    /// hash if present, otherwise md5, otherwise the filename. Per the cache-identity invariant,
    /// this is the only stable key — `package_url` itself may differ between mirrors.
    pub fn cache_key(&self) -> String {
        if let Some(sha256) = &self.sha256 {
            format!("sha256-{sha256:x}")
        } else if let Some(md5) = &self.md5 {
            format!("md5-{md5:x}")
        } else {
            self.filename.clone()
        }
    }
}

impl std::fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.build.is_empty() {
            write!(f, "{} {}", self.name.as_normalized(), self.version)
        } else {
            write!(f, "{}={}={}", self.name.as_normalized(), self.version, self.build)
        }
    }
}

impl RepoData {
    /// Reads and parses [`RepoData`] from a `repodata.json` file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RepoDataError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Returns the `base_url` specified in the repodata, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.base_url.as_deref())
    }

    /// Converts this index into [`crate::RepoDataRecord`]s, resolving each package's url against
    /// `channel`.
    pub fn into_repo_data_records(self, channel: &Channel) -> Vec<crate::RepoDataRecord> {
        let mut records = Vec::with_capacity(self.packages.len() + self.conda_packages.len());
        let channel_name = channel.display_name.clone();
        let base_url = self.base_url().map(ToOwned::to_owned);

        for (filename, mut package_record) in self.packages.into_iter().chain(self.conda_packages) {
            package_record.channel_id = channel.id.clone();
            let platform_dir = package_record
                .platform
                .clone()
                .unwrap_or_else(|| "noarch".to_string());
            let subdir_url = channel
                .canonical_base_url
                .join(&format!("{platform_dir}/"))
                .expect("subdir is a valid url fragment");
            let url = compute_package_url(&subdir_url, base_url.as_deref(), &filename);
            records.push(crate::RepoDataRecord {
                url,
                channel: channel_name.clone(),
                package_record,
                file_name: filename,
            });
        }
        records
    }
}

/// Computes the absolute URL for a package given the repodata's own url, an optional
/// repodata-relative `base_url` override, and the package's filename.
pub fn compute_package_url(repo_data_base_url: &Url, base_url: Option<&str>, filename: &str) -> Url {
    let mut absolute_url = match base_url {
        None => repo_data_base_url.clone(),
        Some(base_url) => match Url::parse(base_url) {
            Ok(url) => url,
            Err(_) => repo_data_base_url
                .join(base_url)
                .expect("base_url is a valid url fragment"),
        },
    };
    if !absolute_url.path().ends_with('/') {
        absolute_url.set_path(&format!("{}/", absolute_url.path()));
    }
    absolute_url
        .join(filename)
        .expect("filename is a valid url fragment")
}

/// Error reading or parsing a [`RepoData`] file.
#[derive(Debug, thiserror::Error)]
pub enum RepoDataError {
    /// The file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The file's contents were not valid repodata JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_record(name: &str, version: &str) -> PackageRecord {
        PackageRecord {
            name: PackageName::new_unchecked(name),
            version: Version::from_str(version).unwrap(),
            build: "py37_0".to_string(),
            build_number: 0,
            channel_id: String::new(),
            platform: Some("linux-64".to_string()),
            depends: Vec::new(),
            constrains: Vec::new(),
            track_features: Vec::new(),
            noarch: NoArchType::none(),
            timestamp: None,
            size: None,
            md5: None,
            sha256: None,
            filename: format!("{name}-{version}-py37_0.tar.bz2"),
            package_url: None,
            license: None,
            signatures: None,
        }
    }

    #[test]
    fn test_cache_key_prefers_sha256() {
        let mut record = sample_record("numpy", "1.20.0");
        assert_eq!(record.cache_key(), record.filename);
        record.md5 = Some(rattler_digest::compute_bytes_digest::<rattler_digest::Md5>(b"x"));
        assert!(record.cache_key().starts_with("md5-"));
        record.sha256 = Some(rattler_digest::compute_bytes_digest::<rattler_digest::Sha256>(b"x"));
        assert!(record.cache_key().starts_with("sha256-"));
    }

    #[test]
    fn test_into_repo_data_records() {
        let mut repo_data = RepoData {
            info: None,
            packages: BTreeMap::new(),
            conda_packages: BTreeMap::new(),
            removed: std::collections::BTreeSet::new(),
            version: Some(1),
        };
        let record = sample_record("numpy", "1.20.0");
        repo_data
            .packages
            .insert(record.filename.clone(), record.clone());

        let channel = Channel::from_url(
            url::Url::parse("https://conda.anaconda.org/conda-forge/").unwrap(),
            None,
        );
        let records = repo_data.into_repo_data_records(&channel);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, record.filename);
        assert_eq!(
            records[0].url.as_str(),
            "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.20.0-py37_0.tar.bz2"
        );
    }
}
