//! Native serialization tier: once a subdir's repodata has been parsed out of JSON, write a
//! msgpack-encoded copy next to it. A later load that would otherwise re-parse the same JSON can
//! instead deserialize the (much cheaper) native copy, provided its embedded origin still
//! matches the `repodata.json`'s url/etag/mtime.

use std::path::Path;

use rattler_conda_types::RepoDataRecord;
use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// The url/etag/mtime a native cache file was generated from. Checked against the current
/// [`crate::RepoDataState`] before trusting the native file over re-parsing JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeOrigin {
    /// The url the json this native cache was derived from was downloaded from.
    pub url: String,
    /// The `ETag` of that download, if any.
    pub etag: Option<String>,
    /// The `Last-Modified` header of that download, if any.
    pub last_modified: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct NativeCache {
    origin: NativeOrigin,
    records: Vec<RepoDataRecord>,
}

/// Writes `records` to `path` in the native format, tagged with `origin`.
///
/// A no-op on Windows: the state machine skips this tier there (see the module docs on
/// [`crate::SubdirLoader`]), so this is only ever called from non-Windows code paths, but the
/// check is kept here too so the invariant holds regardless of caller.
pub fn write(path: &Path, origin: NativeOrigin, records: &[RepoDataRecord]) -> Result<(), GatewayError> {
    if cfg!(windows) {
        return Ok(());
    }
    let cache = NativeCache {
        origin,
        records: records.to_vec(),
    };
    let bytes = rmp_serde::to_vec_named(&cache).map_err(GatewayError::NativeEncode)?;
    fs_err::write(path, bytes)?;
    Ok(())
}

/// Reads a native cache file, returning its records only if `expected_origin` matches what it
/// was written with.
pub fn read_if_matching(
    path: &Path,
    expected_origin: &NativeOrigin,
) -> Result<Option<Vec<RepoDataRecord>>, GatewayError> {
    if cfg!(windows) || !path.is_file() {
        return Ok(None);
    }
    let bytes = fs_err::read(path)?;
    let cache: NativeCache = match rmp_serde::from_slice(&bytes) {
        Ok(cache) => cache,
        Err(_) => return Ok(None),
    };
    if &cache.origin == expected_origin {
        Ok(Some(cache.records))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rattler_conda_types::PackageRecord;

    fn sample_record() -> RepoDataRecord {
        let package_record: PackageRecord = serde_json::from_value(serde_json::json!({
            "name": "foo",
            "version": "1.0",
            "build": "0",
            "build_number": 0,
            "platform": "linux-64"
        }))
        .unwrap();
        RepoDataRecord {
            package_record,
            file_name: "foo-1.0-0.tar.bz2".to_string(),
            url: "https://conda.anaconda.org/conda-forge/linux-64/foo-1.0-0.tar.bz2"
                .parse()
                .unwrap(),
            channel: "conda-forge".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_matching_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repodata.rmp");
        let origin = NativeOrigin {
            url: "https://conda.anaconda.org/conda-forge/linux-64/repodata.json".to_string(),
            etag: Some("\"abc\"".to_string()),
            last_modified: None,
        };
        write(&path, origin.clone(), &[sample_record()]).unwrap();

        if cfg!(windows) {
            assert!(read_if_matching(&path, &origin).unwrap().is_none());
            return;
        }
        let records = read_if_matching(&path, &origin).unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "foo-1.0-0.tar.bz2");
    }

    #[test]
    fn test_mismatched_origin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repodata.rmp");
        let origin = NativeOrigin {
            url: "https://conda.anaconda.org/conda-forge/linux-64/repodata.json".to_string(),
            etag: Some("\"abc\"".to_string()),
            last_modified: None,
        };
        write(&path, origin, &[sample_record()]).unwrap();

        let different_origin = NativeOrigin {
            url: "https://conda.anaconda.org/conda-forge/linux-64/repodata.json".to_string(),
            etag: Some("\"different\"".to_string()),
            last_modified: None,
        };
        if cfg!(windows) {
            assert!(read_if_matching(&path, &different_origin).unwrap().is_none());
            return;
        }
        assert!(read_if_matching(&path, &different_origin).unwrap().is_none());
    }
}
