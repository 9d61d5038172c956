//! Defines [`Prefix`], a thin wrapper around a conda environment directory.

use std::path::{Path, PathBuf};

/// Represents a conda environment prefix (directory).
#[derive(Debug, Clone)]
pub struct Prefix {
    path: PathBuf,
}

impl Prefix {
    /// Creates a new prefix, creating the directory if it doesn't exist yet.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        fs_err::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Returns the path to the prefix.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the trash directory for this prefix, used to stage files that
    /// could not be removed directly (e.g. files locked by a running process
    /// on Windows).
    pub fn trash_dir(&self) -> PathBuf {
        self.path.join(".trash")
    }
}

impl std::ops::Deref for Prefix {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl AsRef<Path> for Prefix {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let prefix_path = dir.path().join("env");
        let prefix = Prefix::create(&prefix_path).unwrap();
        assert!(prefix_path.exists());
        assert_eq!(prefix.path(), prefix_path.as_path());
    }

    #[test]
    fn test_trash_dir() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = Prefix::create(dir.path().join("env")).unwrap();
        assert_eq!(prefix.trash_dir(), dir.path().join("env").join(".trash"));
    }
}
