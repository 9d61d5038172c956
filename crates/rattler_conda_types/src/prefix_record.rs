//! Defines [`PrefixRecord`]: the per-package `conda-meta/<name>-<version>-<build>.json` format.

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rattler_digest::serde::SerializableHash;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::repo_data_record::RepoDataRecord;
use crate::PackageRecord;

/// Information about how files were linked when a package was installed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixPaths {
    /// The version of this file format.
    #[serde(default = "default_paths_version")]
    pub paths_version: u64,

    /// Every file installed with the package.
    #[serde(default)]
    pub paths: Vec<PathsEntry>,
}

fn default_paths_version() -> u64 {
    1
}

impl From<Vec<PathsEntry>> for PrefixPaths {
    fn from(paths: Vec<PathsEntry>) -> Self {
        Self {
            paths_version: default_paths_version(),
            paths,
        }
    }
}

/// A single file linked into a prefix during installation.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PathsEntry {
    /// The relative path from the root of the prefix.
    #[serde(rename = "_path")]
    #[serde_as(as = "crate::utils::serde::NormalizedPath")]
    pub relative_path: PathBuf,

    /// How the file was placed into the prefix.
    pub path_type: PathType,

    /// The SHA256 hash of the file's contents in the package cache, if known.
    #[serde_as(as = "Option<SerializableHash::<rattler_digest::Sha256>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<rattler_digest::Sha256Hash>,

    /// The size of the file in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
}

/// The way a single installed file was placed into a prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// The file is a full copy, independent of the package cache entry.
    Copy,
    /// The file is a hard link into the package cache.
    HardLink,
    /// The file is a symbolic link into the package cache.
    SoftLink,
    /// The file was copied and had a prefix placeholder rewritten to the
    /// actual installation path.
    PrefixReplacedText,
}

/// A record of a single package installed within a prefix. Combines the
/// [`RepoDataRecord`] that identifies where the package came from with
/// install-time metadata: the files that were linked and, if this package was
/// explicitly requested rather than pulled in as a dependency, the spec that
/// was used.
#[derive(Debug, Deserialize, Serialize, Eq, PartialEq, Clone)]
pub struct PrefixRecord {
    /// The data from the repodata this package was installed from.
    #[serde(flatten)]
    pub repodata_record: RepoDataRecord,

    /// The path to the cached archive this package was extracted from, if
    /// still known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_tarball_full_path: Option<PathBuf>,

    /// The path containing the extracted package content in the cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_package_dir: Option<PathBuf>,

    /// Information about how this package's files were linked into the
    /// prefix.
    #[serde(default)]
    pub paths_data: PrefixPaths,

    /// The originating `MatchSpec` string, if this package was explicitly
    /// requested rather than pulled in as a dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_spec: Option<String>,
}

impl PrefixRecord {
    /// Creates a `PrefixRecord` from a `RepoDataRecord` plus install-time
    /// metadata.
    pub fn from_repodata_record(
        repodata_record: RepoDataRecord,
        package_tarball_full_path: Option<PathBuf>,
        extracted_package_dir: Option<PathBuf>,
        paths: Vec<PathsEntry>,
        requested_spec: Option<String>,
    ) -> Self {
        Self {
            repodata_record,
            package_tarball_full_path,
            extracted_package_dir,
            paths_data: paths.into(),
            requested_spec,
        }
    }

    /// Parses a `PrefixRecord` from a reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, std::io::Error> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).map_err(Into::into)
    }

    /// Parses a `PrefixRecord` from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        Self::from_reader(File::open(path.as_ref())?)
    }

    /// The canonical file name for this record: `<name>-<version>-<build>.json`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.json",
            self.repodata_record.package_record.name.as_normalized(),
            self.repodata_record.package_record.version,
            self.repodata_record.package_record.build
        )
    }

    /// Writes this record to the file at the specified location.
    pub fn write_to_path(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), std::io::Error> {
        self.write_to(File::create(path)?, pretty)
    }

    /// Writes this record to a writer.
    pub fn write_to(&self, writer: impl std::io::Write, pretty: bool) -> Result<(), std::io::Error> {
        if pretty {
            serde_json::to_writer_pretty(BufWriter::new(writer), self)?;
        } else {
            serde_json::to_writer(BufWriter::new(writer), self)?;
        }
        Ok(())
    }

    /// Collects all `PrefixRecord`s from `<prefix>/conda-meta`.
    pub fn collect_from_prefix(prefix: &Path) -> Result<Vec<PrefixRecord>, std::io::Error> {
        let mut records = Vec::new();
        let conda_meta_path = prefix.join("conda-meta");

        if !conda_meta_path.exists() {
            return Ok(records);
        }

        for entry in std::fs::read_dir(conda_meta_path)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && entry.file_name().to_string_lossy().ends_with(".json")
            {
                records.push(Self::from_path(entry.path())?);
            }
        }
        Ok(records)
    }
}

impl FromStr for PrefixRecord {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(Into::into)
    }
}

impl AsRef<RepoDataRecord> for PrefixRecord {
    fn as_ref(&self) -> &RepoDataRecord {
        &self.repodata_record
    }
}

impl AsRef<PackageRecord> for PrefixRecord {
    fn as_ref(&self) -> &PackageRecord {
        &self.repodata_record.package_record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoArchType, PackageName, Version};
    use url::Url;

    fn sample_record() -> PrefixRecord {
        let package_record = PackageRecord {
            name: PackageName::new_unchecked("numpy"),
            version: Version::from_str("1.20.0").unwrap(),
            build: "py38_0".to_string(),
            build_number: 0,
            channel_id: "https://conda.anaconda.org/conda-forge/".to_string(),
            platform: Some("linux-64".to_string()),
            depends: Vec::new(),
            constrains: Vec::new(),
            track_features: Vec::new(),
            noarch: NoArchType::none(),
            timestamp: None,
            size: None,
            md5: None,
            sha256: None,
            filename: "numpy-1.20.0-py38_0.tar.bz2".to_string(),
            package_url: None,
            license: None,
            signatures: None,
        };
        let repodata_record = RepoDataRecord {
            package_record,
            file_name: "numpy-1.20.0-py38_0.tar.bz2".to_string(),
            url: Url::parse(
                "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.20.0-py38_0.tar.bz2",
            )
            .unwrap(),
            channel: "conda-forge".to_string(),
        };
        PrefixRecord::from_repodata_record(
            repodata_record,
            None,
            None,
            vec![PathsEntry {
                relative_path: PathBuf::from("lib/numpy/__init__.py"),
                path_type: PathType::HardLink,
                sha256: None,
                size_in_bytes: Some(128),
            }],
            Some("numpy[version='>=1.20,<2']".to_string()),
        )
    }

    #[test]
    fn test_file_name() {
        let record = sample_record();
        assert_eq!(record.file_name(), "numpy-1.20.0-py38_0.json");
    }

    #[test]
    fn test_json_roundtrip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PrefixRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
        assert_eq!(parsed.requested_spec.as_deref(), Some("numpy[version='>=1.20,<2']"));
    }

    #[test]
    fn test_paths_data_preserved() {
        let record = sample_record();
        assert_eq!(record.paths_data.paths.len(), 1);
        assert_eq!(record.paths_data.paths[0].path_type, PathType::HardLink);
    }
}
