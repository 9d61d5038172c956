//! Lazily populated view of the `conda-meta` directory in a prefix.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;

use crate::{PackageName, PrefixRecord};

/// An error that occurred while loading a [`PrefixRecord`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("io error: {0}")]
pub struct PrefixDataError(pub Arc<std::io::Error>);

impl From<std::io::Error> for PrefixDataError {
    fn from(err: std::io::Error) -> Self {
        PrefixDataError(Arc::new(err))
    }
}

/// Internal state for a lazily parsed package record.
struct LazyRecordEntry {
    path: PathBuf,
    record: OnceLock<Result<PrefixRecord, PrefixDataError>>,
}

/// A lazily populated view of the `conda-meta` directory in a prefix. Package
/// names are discovered on construction by parsing each record's filename;
/// the JSON content itself is parsed lazily, on first [`PrefixData::get`].
pub struct PrefixData {
    prefix_path: PathBuf,
    records: HashMap<PackageName, LazyRecordEntry>,
}

impl PrefixData {
    /// Returns the path to the environment prefix.
    pub fn prefix_path(&self) -> &Path {
        &self.prefix_path
    }

    /// Discovers all packages in the `conda-meta` directory but does not
    /// parse any record's JSON yet.
    pub fn new(prefix_path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let prefix_path = prefix_path.into();
        let meta_dir = prefix_path.join("conda-meta");
        let mut records = HashMap::new();

        if !meta_dir.exists() {
            return Ok(Self {
                prefix_path,
                records,
            });
        }

        for entry in fs::read_dir(meta_dir)? {
            let entry = entry?;
            let path = entry.path();

            let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(base_name) = filename.strip_suffix(".json") else {
                continue;
            };
            let Some(name) = package_name_from_record_filename(base_name) else {
                continue;
            };
            let Ok(package_name) = PackageName::try_from(name) else {
                continue;
            };

            records.insert(
                package_name,
                LazyRecordEntry {
                    path,
                    record: OnceLock::new(),
                },
            );
        }

        Ok(Self {
            prefix_path,
            records,
        })
    }

    /// Retrieves a record by package name, parsing its JSON on first access.
    pub fn get(&self, package_name: &PackageName) -> Option<Result<&PrefixRecord, &PrefixDataError>> {
        let entry = self.records.get(package_name)?;
        let record_result = entry
            .record
            .get_or_init(|| PrefixRecord::from_path(&entry.path).map_err(PrefixDataError::from));
        Some(record_result.as_ref())
    }

    /// Returns an iterator over the package names discovered in this prefix.
    pub fn package_names(&self) -> impl Iterator<Item = &PackageName> {
        self.records.keys()
    }
}

/// Extracts the package name from a `conda-meta` record's base filename
/// (`<name>-<version>-<build>`). Conda build strings and versions never
/// contain `-`, so the name is everything before the second-to-last `-`.
fn package_name_from_record_filename(base_name: &str) -> Option<&str> {
    let (_build, rest) = base_name.rsplit_once('-')?;
    let (name, _version) = rest.rsplit_once('-')?;
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_package_name_from_record_filename() {
        assert_eq!(
            package_name_from_record_filename("numpy-1.24.3-py311h_0"),
            Some("numpy")
        );
        assert_eq!(
            package_name_from_record_filename("scikit-learn-1.2.2-py311_1"),
            Some("scikit-learn")
        );
    }

    #[test]
    fn test_prefix_data_lazy_loading() {
        let dir = tempdir().unwrap();
        let meta_dir = dir.path().join("conda-meta");
        fs::create_dir_all(&meta_dir).unwrap();

        fs::write(meta_dir.join("numpy-1.24.3-py311h_0.json"), "{}").unwrap();

        let prefix_data = PrefixData::new(dir.path()).unwrap();
        let numpy_name = PackageName::try_from("numpy").unwrap();
        assert!(prefix_data.records.contains_key(&numpy_name));
    }

    #[test]
    fn test_prefix_data_ignores_non_json() {
        let dir = tempdir().unwrap();
        let meta_dir = dir.path().join("conda-meta");
        fs::create_dir_all(&meta_dir).unwrap();

        fs::write(meta_dir.join("numpy-1.24.3-py311h_0.json"), "{}").unwrap();
        fs::write(meta_dir.join("scikit-learn-1.2.2-py311_1.json"), "{}").unwrap();
        fs::write(meta_dir.join("history"), "some text").unwrap();

        let prefix_data = PrefixData::new(dir.path()).unwrap();
        assert_eq!(prefix_data.records.len(), 2);

        let does_not_exist = PackageName::try_from("does-not-exist").unwrap();
        assert!(prefix_data.get(&does_not_exist).is_none());

        let numpy_name = PackageName::try_from("numpy").unwrap();
        // The file contains `{}`, which is not a valid PrefixRecord, so parsing fails lazily.
        assert!(prefix_data.get(&numpy_name).unwrap().is_err());
    }

    #[test]
    fn test_prefix_data_empty_without_conda_meta() {
        let dir = tempdir().unwrap();
        let prefix_data = PrefixData::new(dir.path()).unwrap();
        assert!(prefix_data.records.is_empty());
    }
}
