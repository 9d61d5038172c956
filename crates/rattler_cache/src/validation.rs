//! Lightweight validation of an extracted package directory.
//!
//! Unlike a full paths.json/hardlink audit, this only checks that the directory looks like a
//! package that was actually extracted here: `info/index.json` exists and parses. That's enough
//! to tell "an extraction was interrupted or never happened" apart from "this entry is usable",
//! which is all [`super::package_cache::PackageCache`] needs to decide whether to re-fetch.

use std::path::Path;

/// An error that can occur while validating a package directory.
#[derive(Debug, thiserror::Error)]
pub enum PackageValidationError {
    /// An IO error occurred while validating the package.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The `info/index.json` file could not be parsed as JSON.
    #[error("could not parse 'info/index.json': {0}")]
    InvalidIndexJson(serde_json::Error),

    /// The package directory does not contain an `info/index.json` file.
    #[error("package cache entry is missing 'info/index.json'")]
    MissingIndexJson,
}

/// Validates that `package_dir` contains a usable, fully extracted package by checking that
/// `info/index.json` exists and parses as a JSON object with at least a `name` field.
pub fn validate_package_directory(package_dir: &Path) -> Result<(), PackageValidationError> {
    let index_json_path = package_dir.join("info").join("index.json");
    if !index_json_path.is_file() {
        return Err(PackageValidationError::MissingIndexJson);
    }

    let contents = fs_err::read_to_string(&index_json_path)?;
    let index: serde_json::Value =
        serde_json::from_str(&contents).map_err(PackageValidationError::InvalidIndexJson)?;

    if index.get("name").and_then(serde_json::Value::as_str).is_none() {
        return Err(PackageValidationError::MissingIndexJson);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_json() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_package_directory(dir.path()).unwrap_err();
        assert!(matches!(err, PackageValidationError::MissingIndexJson));
    }

    #[test]
    fn test_invalid_index_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("info")).unwrap();
        std::fs::write(dir.path().join("info").join("index.json"), b"not json").unwrap();
        let err = validate_package_directory(dir.path()).unwrap_err();
        assert!(matches!(err, PackageValidationError::InvalidIndexJson(_)));
    }

    #[test]
    fn test_valid_package_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("info")).unwrap();
        std::fs::write(
            dir.path().join("info").join("index.json"),
            br#"{"name": "foo", "version": "1.0"}"#,
        )
        .unwrap();
        validate_package_directory(dir.path()).unwrap();
    }
}
