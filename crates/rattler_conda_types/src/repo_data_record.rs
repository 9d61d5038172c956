//! Defines [`RepoDataRecord`].

use crate::PackageRecord;
use serde::{Deserialize, Serialize};
use url::Url;

/// A [`PackageRecord`] together with the source it was retrieved from: the canonical url it can
/// be (re)downloaded from, and a display form of the channel (a name or url, not necessarily the
/// canonical base url).
#[derive(Debug, Deserialize, Serialize, Eq, PartialEq, Clone, Hash)]
pub struct RepoDataRecord {
    /// The package metadata.
    #[serde(flatten)]
    pub package_record: PackageRecord,

    /// The filename of the package archive.
    #[serde(rename = "fn")]
    pub file_name: String,

    /// The canonical url to download this package from.
    pub url: Url,

    /// The channel this package came from, as a display string.
    pub channel: String,
}

impl AsRef<PackageRecord> for RepoDataRecord {
    fn as_ref(&self) -> &PackageRecord {
        &self.package_record
    }
}
