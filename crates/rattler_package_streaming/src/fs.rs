//! Extracts a package archive from a path on disk.

use std::fs::File;
use std::path::Path;

use crate::{ArchiveType, ExtractError};

/// Extracts a `.tar.bz2` package archive at `archive` to `destination`.
pub fn extract_tar_bz2(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive)?;
    crate::read::extract_tar_bz2(file, destination)
}

/// Extracts a `.conda` package archive at `archive` to `destination`.
pub fn extract_conda(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive)?;
    crate::read::extract_conda(file, destination)
}

/// Extracts the package archive at `archive` to `destination`. The archive format is
/// determined from `archive`'s file name.
pub fn extract(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
    match ArchiveType::try_from(archive).ok_or(ExtractError::UnsupportedArchiveType)? {
        ArchiveType::TarBz2 => extract_tar_bz2(archive, destination),
        ArchiveType::Conda => extract_conda(archive, destination),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_tar_bz2_fixture(path: &Path) {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            let data = b"{}";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "info/index.json", &data[..]).unwrap();
            builder.finish().unwrap();
        }
        std::fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_extract_tar_bz2_from_path() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("test-1.0-0.tar.bz2");
        write_tar_bz2_fixture(&archive_path);

        let dest = dir.path().join("extracted");
        extract_tar_bz2(&archive_path, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("info/index.json")).unwrap(), b"{}");
    }

    #[test]
    fn test_extract_dispatches_by_extension() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("test-1.0-0.tar.bz2");
        write_tar_bz2_fixture(&archive_path);

        let dest = dir.path().join("extracted");
        extract(&archive_path, &dest).unwrap();
        assert!(dest.join("info/index.json").exists());
    }

    #[test]
    fn test_extract_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("test.zip");
        std::fs::write(&archive_path, b"not a conda package").unwrap();

        let dest = dir.path().join("extracted");
        assert!(matches!(
            extract(&archive_path, &dest),
            Err(ExtractError::UnsupportedArchiveType)
        ));
    }
}
