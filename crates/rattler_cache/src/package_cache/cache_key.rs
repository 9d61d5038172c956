use std::fmt::{Display, Formatter};
use std::path::Path;

use itertools::Itertools;
use rattler_conda_types::PackageRecord;
use rattler_digest::Sha256Hash;
use rattler_package_streaming::ArchiveType;
use url::Url;

/// Identifies a package's slot in the cache: the `<name>-<version>-<build>` directory name the
/// archive is downloaded to and extracted under, plus an optional expected sha256 used to
/// invalidate a stale entry.
///
/// Two packages with the same name/version/build but different content (a rebuilt package
/// pushed under the same filename) share a [`CacheKey`] but not a cache entry — the `sha256`
/// field is what the cache actually checks before trusting what's on disk.
#[derive(Debug, Hash, Clone, Eq, PartialEq)]
pub struct CacheKey {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) build_string: String,
    pub(crate) sha256: Option<Sha256Hash>,
}

impl CacheKey {
    /// Adds a sha256 hash of the archive.
    pub fn with_sha256(mut self, sha256: Sha256Hash) -> Self {
        self.sha256 = Some(sha256);
        self
    }

    /// Potentially adds a sha256 hash of the archive.
    pub fn with_opt_sha256(mut self, sha256: Option<Sha256Hash>) -> Self {
        self.sha256 = sha256;
        self
    }

    /// Returns the sha256 hash of the package if it is known.
    pub fn sha256(&self) -> Option<Sha256Hash> {
        self.sha256
    }

    /// Parses a `<name>-<version>-<build>.<ext>` package filename into a [`CacheKey`], with no
    /// sha256 set. Returns `None` if the extension isn't a recognized archive type or the stem
    /// doesn't split into three `-`-separated components.
    pub fn try_from_filename(filename: &str) -> Option<Self> {
        let archive_type = ArchiveType::try_from(filename)?;
        let without_ext = filename.strip_suffix(archive_type.extension())?;
        let (build_string, version, name) = without_ext.rsplitn(3, '-').next_tuple()?;
        Some(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            build_string: build_string.to_owned(),
            sha256: None,
        })
    }

    /// Parses a package archive's file name off of `path`. See [`Self::try_from_filename`].
    pub fn try_from_path(path: impl AsRef<Path>) -> Option<Self> {
        Self::try_from_filename(path.as_ref().file_name()?.to_str()?)
    }

    /// Parses a package archive's file name off of `url`. See [`Self::try_from_filename`].
    pub fn try_from_url(url: &Url) -> Option<Self> {
        Self::try_from_filename(url.path_segments().and_then(Iterator::last)?)
    }
}

impl From<&PackageRecord> for CacheKey {
    fn from(record: &PackageRecord) -> Self {
        Self {
            name: record.name.as_normalized().to_string(),
            version: record.version.to_string(),
            build_string: record.build.clone(),
            sha256: record.sha256,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", &self.name, &self.version, &self.build_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rattler_digest::{parse_digest_from_hex, Sha256};

    #[test]
    fn test_try_from_filename_tar_bz2() {
        let key = CacheKey::try_from_filename(
            "ros-noetic-rosbridge-suite-0.11.14-py39h6fdeb60_14.tar.bz2",
        )
        .unwrap();
        assert_eq!(key.name, "ros-noetic-rosbridge-suite");
        assert_eq!(key.version, "0.11.14");
        assert_eq!(key.build_string, "py39h6fdeb60_14");
        assert_eq!(key.sha256, None);
    }

    #[test]
    fn test_try_from_filename_conda() {
        let key = CacheKey::try_from_filename("clangdev-9.0.1-cling_v0.9_hd1e6b3a_3.conda").unwrap();
        assert_eq!(key.name, "clangdev");
        assert_eq!(key.version, "9.0.1");
        assert_eq!(key.build_string, "cling_v0.9_hd1e6b3a_3");
    }

    #[test]
    fn test_try_from_filename_rejects_unknown_extension() {
        assert!(CacheKey::try_from_filename("numpy-2.4.1-cp314-cp314-linux_x86_64.whl").is_none());
    }

    #[test]
    fn test_try_from_url() {
        let url =
            Url::parse("https://conda.anaconda.org/conda-forge/win-64/conda-22.9.0-py38haa244fe_2.tar.bz2")
                .unwrap();
        let key = CacheKey::try_from_url(&url).unwrap();
        assert_eq!(key.to_string(), "conda-22.9.0-py38haa244fe_2");
    }

    #[test]
    fn test_display_excludes_sha256() {
        let key = CacheKey {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            build_string: "0".to_string(),
            sha256: Some(parse_digest_from_hex::<Sha256>(
                "4dd9893f1eee45e1579d1a4f5533ef67a84b5e4b7515de7ed0db1dd47adc6bc8",
            )
            .unwrap()),
        };
        assert_eq!(key.to_string(), "foo-1.0-0");
    }
}
